use std::collections::HashSet;

use crate::contact_db::Contact;
use crate::reconcile::Identifiers;

/// A fully linked identity cluster: exactly one primary, every other member linked to it.
///
/// Members are kept primary first, then secondaries by `(created_at, id)`; appended members go
/// last.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    members: Vec<Contact>,
}

impl Cluster {
    pub fn from_contacts(contacts: Vec<Contact>) -> anyhow::Result<Self> {
        let mut primaries = contacts.iter().filter(|c| c.is_primary());
        let primary_id = primaries
            .next()
            .map(|c| c.id)
            .ok_or_else(|| anyhow::anyhow!("cluster has no primary contact"))?;
        if let Some(other) = primaries.next() {
            return Err(anyhow::anyhow!(
                "cluster has more than one primary ({} and {})",
                primary_id,
                other.id
            ));
        }
        if let Some(stray) = contacts.iter().find(|c| c.primary_id() != primary_id) {
            return Err(anyhow::anyhow!(
                "contact {} links to {} instead of cluster primary {}",
                stray.id,
                stray.primary_id(),
                primary_id
            ));
        }

        let mut seen = HashSet::new();
        let mut members: Vec<Contact> = contacts.into_iter().filter(|c| seen.insert(c.id)).collect();
        members.sort_by_key(|c| (!c.is_primary(), c.created_at, c.id));
        Ok(Self { members })
    }

    pub fn primary(&self) -> &Contact {
        &self.members[0]
    }

    pub fn members(&self) -> &[Contact] {
        &self.members
    }

    pub fn secondaries(&self) -> impl Iterator<Item = &Contact> {
        self.members.iter().skip(1)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.members.iter().any(|c| c.id == id)
    }

    /// Distinct emails in member order
    pub fn emails(&self) -> Vec<&str> {
        distinct(self.members.iter().map(|c| c.email.as_deref()))
    }

    /// Distinct phone numbers in member order
    pub fn phone_numbers(&self) -> Vec<&str> {
        distinct(self.members.iter().map(|c| c.phone_number.as_deref()))
    }

    /// True when `ids` carries an email or phone number no member has.
    pub fn has_novel_information(&self, ids: &Identifiers) -> bool {
        let novel_email = ids
            .email()
            .is_some_and(|email| !self.members.iter().any(|c| c.email.as_deref() == Some(email)));
        let novel_phone = ids.phone_number().is_some_and(|phone| {
            !self
                .members
                .iter()
                .any(|c| c.phone_number.as_deref() == Some(phone))
        });
        novel_email || novel_phone
    }

    /// Append a freshly stored secondary of this cluster.
    pub fn push(&mut self, contact: Contact) -> anyhow::Result<()> {
        if contact.is_primary() || contact.primary_id() != self.primary().id {
            return Err(anyhow::anyhow!(
                "contact {} is not a secondary of cluster {}",
                contact.id,
                self.primary().id
            ));
        }
        if !self.contains(contact.id) {
            self.members.push(contact);
        }
        Ok(())
    }
}

fn distinct<'a>(values: impl Iterator<Item = Option<&'a str>>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    values.flatten().filter(|value| seen.insert(*value)).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::contact_db::Link;
    use chrono::{DateTime, TimeZone, Utc};

    pub(crate) fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    pub(crate) fn contact(id: i64, email: Option<&str>, phone: Option<&str>, link: Link, created: i64) -> Contact {
        Contact {
            id,
            email: email.map(String::from),
            phone_number: phone.map(String::from),
            link,
            created_at: at(created),
            updated_at: at(created),
            deleted_at: None,
        }
    }

    #[test]
    fn test_members_ordered_primary_first() {
        let cluster = Cluster::from_contacts(vec![
            contact(5, Some("c@x.com"), None, Link::Secondary { primary_id: 2 }, 3),
            contact(4, Some("b@x.com"), None, Link::Secondary { primary_id: 2 }, 3),
            contact(2, Some("a@x.com"), Some("111"), Link::Primary, 9),
        ])
        .unwrap();

        let ids: Vec<i64> = cluster.members().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 4, 5]);
        assert_eq!(cluster.emails(), vec!["a@x.com", "b@x.com", "c@x.com"]);
        assert_eq!(cluster.phone_numbers(), vec!["111"]);
    }

    #[test]
    fn test_rejects_two_primaries_and_strays() {
        assert!(Cluster::from_contacts(vec![
            contact(1, Some("a@x.com"), None, Link::Primary, 0),
            contact(2, Some("b@x.com"), None, Link::Primary, 1),
        ])
        .is_err());

        assert!(Cluster::from_contacts(vec![
            contact(1, Some("a@x.com"), None, Link::Primary, 0),
            contact(3, Some("b@x.com"), None, Link::Secondary { primary_id: 9 }, 1),
        ])
        .is_err());

        assert!(Cluster::from_contacts(Vec::new()).is_err());
    }

    #[test]
    fn test_novelty_is_checked_against_the_union() {
        let cluster = Cluster::from_contacts(vec![
            contact(1, Some("a@x.com"), Some("111"), Link::Primary, 0),
            contact(2, Some("b@x.com"), Some("222"), Link::Secondary { primary_id: 1 }, 1),
        ])
        .unwrap();

        // email from one row, phone from another: nothing new
        let ids = Identifiers::new(Some("a@x.com".into()), Some("222".into())).unwrap();
        assert!(!cluster.has_novel_information(&ids));

        let ids = Identifiers::new(Some("c@x.com".into()), Some("222".into())).unwrap();
        assert!(cluster.has_novel_information(&ids));

        let ids = Identifiers::new(None, Some("333".into())).unwrap();
        assert!(cluster.has_novel_information(&ids));
    }

    #[test]
    fn test_push_only_accepts_own_secondaries() {
        let mut cluster = Cluster::from_contacts(vec![contact(1, Some("a@x.com"), None, Link::Primary, 0)]).unwrap();

        assert!(cluster
            .push(contact(2, None, Some("111"), Link::Secondary { primary_id: 8 }, 1))
            .is_err());
        cluster
            .push(contact(3, None, Some("111"), Link::Secondary { primary_id: 1 }, 1))
            .unwrap();
        assert_eq!(cluster.secondaries().map(|c| c.id).collect::<Vec<_>>(), vec![3]);
    }
}
