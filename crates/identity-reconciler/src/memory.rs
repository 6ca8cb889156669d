use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::contact_db::{Contact, Link, NewContact};
use crate::reconcile::ContactStore;

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Process-local contact store.
///
/// Not transactional: callers that share one across threads must serialize reconciliations
/// themselves.
#[derive(Clone)]
pub struct InMemoryContactStore {
    contacts: Arc<DashMap<i64, Contact>>,
    next_id: Arc<AtomicI64>,
    writes: Arc<AtomicUsize>,
    clock: Clock,
}

impl InMemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock<F>(clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        Self {
            clock: Arc::new(clock),
            ..Self::default()
        }
    }

    /// Store a fully formed row as-is. Does not count as a write.
    pub fn seed(&self, contact: Contact) {
        self.next_id.fetch_max(contact.id + 1, Ordering::SeqCst);
        self.contacts.insert(contact.id, contact);
    }

    pub fn get(&self, id: i64) -> Option<Contact> {
        self.contacts.get(&id).map(|entry| entry.value().clone())
    }

    /// All rows ordered by `(created_at, id)`
    pub fn all(&self) -> Vec<Contact> {
        let mut contacts: Vec<Contact> = self.contacts.iter().map(|entry| entry.value().clone()).collect();
        sort_contacts(&mut contacts);
        contacts
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Inserts and updates performed through [`ContactStore`]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn collect_where<P>(&self, predicate: P) -> Vec<Contact>
    where
        P: Fn(&Contact) -> bool,
    {
        let mut contacts: Vec<Contact> = self
            .contacts
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        sort_contacts(&mut contacts);
        contacts
    }
}

impl Default for InMemoryContactStore {
    fn default() -> Self {
        Self {
            contacts: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicI64::new(1)),
            writes: Arc::new(AtomicUsize::new(0)),
            clock: Arc::new(Utc::now),
        }
    }
}

fn sort_contacts(contacts: &mut [Contact]) {
    contacts.sort_by_key(|c| (c.created_at, c.id));
}

impl ContactStore for InMemoryContactStore {
    fn find_by_identifier(
        &self,
        email: Option<&str>,
        phone_number: Option<&str>,
    ) -> anyhow::Result<Vec<Contact>> {
        Ok(self.collect_where(|c| {
            (email.is_some() && c.email.as_deref() == email)
                || (phone_number.is_some() && c.phone_number.as_deref() == phone_number)
        }))
    }

    fn find_cluster(&self, primary_id: i64) -> anyhow::Result<Vec<Contact>> {
        Ok(self.collect_where(|c| c.id == primary_id || c.link.linked_id() == Some(primary_id)))
    }

    fn insert(&self, contact: NewContact) -> anyhow::Result<Contact> {
        if let Some(target) = contact.link.linked_id() {
            if !self.contacts.contains_key(&target) {
                return Err(anyhow::anyhow!("Contact {} not found", target));
            }
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = (self.clock)();
        let stored = Contact {
            id,
            email: contact.email,
            phone_number: contact.phone_number,
            link: contact.link,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.contacts.insert(id, stored.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(stored)
    }

    fn update(&self, id: i64, link: Link) -> anyhow::Result<()> {
        let now = (self.clock)();
        let mut entry = self
            .contacts
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("Contact {} not found", id))?;
        entry.link = link;
        entry.updated_at = now;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
