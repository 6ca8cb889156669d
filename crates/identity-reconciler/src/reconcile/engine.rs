//! One reconciliation: resolve, merge, record novel identifiers, project.
use tracing::{debug, info};

use crate::contact_db::{Contact, Link};
use crate::reconcile::{merge, resolve, Cluster, ConsolidatedContact, ContactStore, Identifiers, MergeSummary, Resolution};

/// Result of reconciling one identifier pair
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub contact: ConsolidatedContact,
    /// Row written for this request, primary for a new identity, secondary for novel information
    pub created: Option<Contact>,
    pub merge: MergeSummary,
}

impl Reconciliation {
    /// Number of store writes this reconciliation performed
    pub fn writes(&self) -> usize {
        self.merge.writes() + usize::from(self.created.is_some())
    }
}

pub fn reconcile<S: ContactStore + ?Sized>(store: &S, ids: &Identifiers) -> anyhow::Result<Reconciliation> {
    let working = match resolve(store, ids)? {
        Resolution::NewIdentity => return create_identity(store, ids),
        Resolution::Existing(working) => working,
    };

    let (mut cluster, summary) = merge(store, working)?;

    let created = if cluster.has_novel_information(ids) {
        let primary_id = cluster.primary().id;
        let contact = store.insert(ids.to_new_contact(Link::Secondary { primary_id })?)?;
        info!(contact_id = contact.id, primary_id, "linked novel identifier as secondary contact");
        cluster.push(contact.clone())?;
        Some(contact)
    } else {
        debug!(primary_id = cluster.primary().id, "identifiers already known to cluster");
        None
    };

    Ok(Reconciliation {
        contact: ConsolidatedContact::from_cluster(&cluster),
        created,
        merge: summary,
    })
}

fn create_identity<S: ContactStore + ?Sized>(store: &S, ids: &Identifiers) -> anyhow::Result<Reconciliation> {
    let contact = store.insert(ids.to_new_contact(Link::Primary)?)?;
    info!(contact_id = contact.id, "created primary contact for new identity");
    let cluster = Cluster::from_contacts(vec![contact.clone()])?;
    Ok(Reconciliation {
        contact: ConsolidatedContact::from_cluster(&cluster),
        created: Some(contact),
        merge: MergeSummary::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryContactStore;
    use crate::reconcile::cluster::tests::contact;

    fn ids(email: Option<&str>, phone: Option<&str>) -> Identifiers {
        Identifiers::new(email.map(String::from), phone.map(String::from)).unwrap()
    }

    #[test]
    fn test_new_identity_creates_primary() {
        let store = InMemoryContactStore::new();
        let result = reconcile(&store, &ids(Some("a@x.com"), None)).unwrap();

        let created = result.created.clone().unwrap();
        assert!(created.is_primary());
        assert_eq!(
            result.contact,
            ConsolidatedContact {
                primary_contact_id: created.id,
                emails: vec!["a@x.com".into()],
                phone_numbers: vec![],
                secondary_contact_ids: vec![],
            }
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_known_pair_is_a_pure_lookup() {
        let store = InMemoryContactStore::new();
        store.seed(contact(1, Some("e@x.com"), Some("111"), Link::Primary, 0));

        let result = reconcile(&store, &ids(Some("e@x.com"), Some("111"))).unwrap();
        assert!(result.created.is_none());
        assert_eq!(result.writes(), 0);
        assert_eq!(store.writes(), 0);
        assert_eq!(result.contact.primary_contact_id, 1);
    }

    #[test]
    fn test_new_phone_adds_secondary() {
        let store = InMemoryContactStore::new();
        store.seed(contact(1, Some("e@x.com"), Some("111"), Link::Primary, 0));

        let result = reconcile(&store, &ids(Some("e@x.com"), Some("222"))).unwrap();
        let created = result.created.clone().unwrap();
        assert_eq!(created.link, Link::Secondary { primary_id: 1 });
        assert_eq!(result.contact.emails, vec!["e@x.com"]);
        assert_eq!(result.contact.phone_numbers, vec!["111", "222"]);
        assert_eq!(result.contact.secondary_contact_ids, vec![created.id]);
    }

    #[test]
    fn test_partial_request_matching_known_value_writes_nothing() {
        let store = InMemoryContactStore::new();
        store.seed(contact(1, Some("e@x.com"), Some("111"), Link::Primary, 0));
        store.seed(contact(2, Some("f@x.com"), Some("111"), Link::Secondary { primary_id: 1 }, 1));

        let result = reconcile(&store, &ids(None, Some("111"))).unwrap();
        assert!(result.created.is_none());
        assert_eq!(result.contact.emails, vec!["e@x.com", "f@x.com"]);
        assert_eq!(result.contact.secondary_contact_ids, vec![2]);
    }

    #[test]
    fn test_two_primaries_merge_into_oldest() {
        let store = InMemoryContactStore::new();
        store.seed(contact(11, Some("george@hillvalley.edu"), Some("919191"), Link::Primary, 0));
        store.seed(contact(27, Some("biffsucks@hillvalley.edu"), Some("717171"), Link::Primary, 10));

        let result = reconcile(&store, &ids(Some("george@hillvalley.edu"), Some("717171"))).unwrap();
        assert!(result.created.is_none());
        assert_eq!(result.merge.demoted, vec![27]);
        assert_eq!(
            result.contact,
            ConsolidatedContact {
                primary_contact_id: 11,
                emails: vec!["george@hillvalley.edu".into(), "biffsucks@hillvalley.edu".into()],
                phone_numbers: vec!["919191".into(), "717171".into()],
                secondary_contact_ids: vec![27],
            }
        );
    }

    #[test]
    fn test_three_primaries_collapse_into_oldest() {
        let store = InMemoryContactStore::new();
        store.seed(contact(1, Some("a@x.com"), Some("555"), Link::Primary, 0));
        store.seed(contact(2, Some("b@x.com"), Some("555"), Link::Primary, 1));
        store.seed(contact(3, Some("c@x.com"), Some("777"), Link::Primary, 2));
        store.seed(contact(4, Some("d@x.com"), Some("777"), Link::Secondary { primary_id: 3 }, 3));

        // phone reaches 1 and 2, email reaches 3
        let result = reconcile(&store, &ids(Some("c@x.com"), Some("555"))).unwrap();
        assert!(result.created.is_none());
        assert_eq!(result.merge.demoted, vec![2, 3]);
        assert_eq!(result.merge.relinked, vec![4]);
        assert_eq!(result.writes(), 3);
        assert_eq!(
            result.contact,
            ConsolidatedContact {
                primary_contact_id: 1,
                emails: vec!["a@x.com".into(), "b@x.com".into(), "c@x.com".into(), "d@x.com".into()],
                phone_numbers: vec!["555".into(), "777".into()],
                secondary_contact_ids: vec![2, 3, 4],
            }
        );

        assert!(store.get(1).unwrap().is_primary());
        for id in 2..=4 {
            assert_eq!(store.get(id).unwrap().link, Link::Secondary { primary_id: 1 });
        }
    }

    #[test]
    fn test_merge_then_novel_email_links_to_survivor() {
        let store = InMemoryContactStore::new();
        store.seed(contact(1, Some("a@x.com"), Some("111"), Link::Primary, 0));
        store.seed(contact(2, Some("b@x.com"), Some("222"), Link::Primary, 5));
        store.seed(contact(3, Some("c@x.com"), Some("222"), Link::Secondary { primary_id: 2 }, 6));

        // only cluster 2 matches
        let result = reconcile(&store, &ids(Some("d@x.com"), Some("222"))).unwrap();
        assert_eq!(result.contact.primary_contact_id, 2);
        assert!(result.merge.is_empty());
        assert_eq!(result.created.as_ref().unwrap().link, Link::Secondary { primary_id: 2 });

        let result = reconcile(&store, &ids(Some("d@x.com"), Some("111"))).unwrap();
        assert_eq!(result.contact.primary_contact_id, 1);
        assert_eq!(result.merge.demoted, vec![2]);
        assert!(result.created.is_none());
        assert_eq!(result.contact.emails, vec!["a@x.com", "b@x.com", "c@x.com", "d@x.com"]);
        assert_eq!(result.contact.phone_numbers, vec!["111", "222"]);
    }

    #[test]
    fn test_repeat_request_is_idempotent() {
        let store = InMemoryContactStore::new();
        store.seed(contact(1, Some("a@x.com"), Some("111"), Link::Primary, 0));
        store.seed(contact(2, Some("b@x.com"), Some("111"), Link::Primary, 4));

        let first = reconcile(&store, &ids(Some("a@x.com"), Some("999"))).unwrap();
        let writes_after_first = store.writes();
        let second = reconcile(&store, &ids(Some("a@x.com"), Some("999"))).unwrap();

        assert_eq!(first.contact, second.contact);
        assert_eq!(store.writes(), writes_after_first);
        assert_eq!(second.writes(), 0);
    }

    mod invariants {
        use super::*;
        use proptest::prelude::*;
        use std::collections::HashMap;

        const EMAILS: [&str; 4] = ["a@x.com", "b@x.com", "c@x.com", "d@x.com"];
        const PHONES: [&str; 4] = ["111", "222", "333", "444"];

        fn request() -> impl Strategy<Value = (Option<usize>, Option<usize>)> {
            (
                proptest::option::of(0..EMAILS.len()),
                proptest::option::of(0..PHONES.len()),
            )
                .prop_filter("needs an identifier", |(e, p)| e.is_some() || p.is_some())
        }

        fn to_ids((email, phone): (Option<usize>, Option<usize>)) -> Identifiers {
            Identifiers::new(
                email.map(|i| EMAILS[i].to_string()),
                phone.map(|i| PHONES[i].to_string()),
            )
            .unwrap()
        }

        fn root(parent: &HashMap<i64, i64>, mut id: i64) -> i64 {
            while parent[&id] != id {
                id = parent[&id];
            }
            id
        }

        fn connected(a: &Contact, b: &Contact) -> bool {
            (a.email.is_some() && a.email == b.email)
                || (a.phone_number.is_some() && a.phone_number == b.phone_number)
                || a.link.linked_id() == Some(b.id)
        }

        proptest! {
            #[test]
            fn every_connected_group_has_exactly_one_primary(
                requests in proptest::collection::vec(request(), 1..24)
            ) {
                let store = InMemoryContactStore::new();
                for request in &requests {
                    let result = reconcile(&store, &to_ids(*request)).unwrap();
                    prop_assert!(store.get(result.contact.primary_contact_id).unwrap().is_primary());
                }

                let contacts = store.all();
                for c in &contacts {
                    if let Link::Secondary { primary_id } = c.link {
                        prop_assert!(store.get(primary_id).unwrap().is_primary());
                    }
                }

                let mut parent: HashMap<i64, i64> = contacts.iter().map(|c| (c.id, c.id)).collect();
                for a in &contacts {
                    for b in &contacts {
                        if connected(a, b) {
                            let (ra, rb) = (root(&parent, a.id), root(&parent, b.id));
                            if ra != rb {
                                parent.insert(ra, rb);
                            }
                        }
                    }
                }
                let mut primaries_per_group: HashMap<i64, usize> = HashMap::new();
                for c in &contacts {
                    let group = primaries_per_group.entry(root(&parent, c.id)).or_default();
                    if c.is_primary() {
                        *group += 1;
                    }
                }
                prop_assert!(primaries_per_group.values().all(|&count| count == 1));

                // replaying the last request against the settled store writes nothing
                let writes = store.writes();
                let replay = reconcile(&store, &to_ids(*requests.last().unwrap())).unwrap();
                prop_assert_eq!(replay.writes(), 0);
                prop_assert_eq!(store.writes(), writes);
            }
        }
    }
}
