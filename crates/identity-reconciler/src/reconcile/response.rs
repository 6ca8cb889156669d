use serde::{Deserialize, Serialize};

use crate::reconcile::Cluster;

/// Consolidated view of one identity cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedContact {
    pub primary_contact_id: i64,
    pub emails: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub secondary_contact_ids: Vec<i64>,
}

impl ConsolidatedContact {
    /// Identifiers come out in member order, so the primary's email and phone lead.
    pub fn from_cluster(cluster: &Cluster) -> Self {
        Self {
            primary_contact_id: cluster.primary().id,
            emails: cluster.emails().into_iter().map(String::from).collect(),
            phone_numbers: cluster.phone_numbers().into_iter().map(String::from).collect(),
            secondary_contact_ids: cluster.secondaries().map(|c| c.id).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact_db::Link;
    use crate::reconcile::cluster::tests::contact;

    #[test]
    fn test_projection_of_cluster() {
        let cluster = Cluster::from_contacts(vec![
            contact(1, Some("lorraine@hillvalley.edu"), Some("123456"), Link::Primary, 0),
            contact(23, Some("mcfly@hillvalley.edu"), Some("123456"), Link::Secondary { primary_id: 1 }, 1),
            contact(24, None, Some("717171"), Link::Secondary { primary_id: 1 }, 2),
        ])
        .unwrap();

        let consolidated = ConsolidatedContact::from_cluster(&cluster);
        assert_eq!(consolidated.primary_contact_id, 1);
        assert_eq!(consolidated.emails, vec!["lorraine@hillvalley.edu", "mcfly@hillvalley.edu"]);
        assert_eq!(consolidated.phone_numbers, vec!["123456", "717171"]);
        assert_eq!(consolidated.secondary_contact_ids, vec![23, 24]);
    }

    #[test]
    fn test_serializes_camel_case() {
        let cluster = Cluster::from_contacts(vec![contact(1, Some("a@x.com"), None, Link::Primary, 0)]).unwrap();
        let json = serde_json::to_value(ConsolidatedContact::from_cluster(&cluster)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "primaryContactId": 1,
                "emails": ["a@x.com"],
                "phoneNumbers": [],
                "secondaryContactIds": []
            })
        );
    }
}
