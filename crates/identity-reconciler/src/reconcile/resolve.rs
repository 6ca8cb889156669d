//! Cluster resolution: from a submitted identifier pair to every contact of the identities it
//! touches.
use std::collections::{BTreeSet, HashSet};

use tracing::{debug, warn};

use crate::contact_db::{Contact, Link};
use crate::reconcile::{ContactStore, Identifiers};

/// Longest `linked_id` chain followed before the data is treated as corrupt.
pub const MAX_LINK_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Nothing in the store matches either identifier.
    NewIdentity,
    /// One or more existing clusters match.
    Existing(WorkingSet),
}

/// Union of every cluster reached from the matched contacts, de-duplicated by id.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingSet {
    primary_ids: BTreeSet<i64>,
    contacts: Vec<Contact>,
}

impl WorkingSet {
    /// Distinct primary ids the matched contacts resolved to
    pub fn primary_ids(&self) -> &BTreeSet<i64> {
        &self.primary_ids
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn into_contacts(self) -> Vec<Contact> {
        self.contacts
    }
}

pub fn resolve<S: ContactStore + ?Sized>(store: &S, ids: &Identifiers) -> anyhow::Result<Resolution> {
    let matched = store.find_by_identifier(ids.email(), ids.phone_number())?;
    if matched.is_empty() {
        return Ok(Resolution::NewIdentity);
    }

    let linked_ids: BTreeSet<i64> = matched.iter().map(Contact::primary_id).collect();

    let mut primary_ids = BTreeSet::new();
    let mut seen = HashSet::new();
    let mut contacts = Vec::new();
    for linked_id in linked_ids {
        let (primary_id, reached) = root_cluster(store, linked_id)?;
        primary_ids.insert(primary_id);
        contacts.extend(reached.into_iter().filter(|c| seen.insert(c.id)));
    }

    debug!(
        matched = matched.len(),
        primaries = primary_ids.len(),
        contacts = contacts.len(),
        "resolved identity clusters"
    );
    Ok(Resolution::Existing(WorkingSet { primary_ids, contacts }))
}

/// Fetch the cluster headed by `start`, following the link upward when `start` is itself a
/// secondary. Rows met on the way are returned too so the merge step can re-point them.
fn root_cluster<S: ContactStore + ?Sized>(store: &S, start: i64) -> anyhow::Result<(i64, Vec<Contact>)> {
    let mut reached = Vec::new();
    let mut id = start;
    for _ in 0..MAX_LINK_DEPTH {
        let cluster = store.find_cluster(id)?;
        let head = cluster
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.link)
            .ok_or_else(|| anyhow::anyhow!("contact {} is linked to but does not exist", id))?;
        reached.extend(cluster);
        match head {
            Link::Primary => return Ok((id, reached)),
            Link::Secondary { primary_id } => {
                warn!(contact_id = id, primary_id, "secondary contact used as link target; following chain");
                id = primary_id;
            }
        }
    }
    Err(anyhow::anyhow!(
        "link chain starting at contact {} exceeds {} hops",
        start,
        MAX_LINK_DEPTH
    ))
}
