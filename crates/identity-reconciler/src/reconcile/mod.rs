//! Identity reconciliation engine
//!
//! Resolves a submitted (email, phone number) pair to the identity cluster it belongs to,
//! merging clusters that turn out to share an identifier and recording novel identifiers as
//! secondary contacts.

pub mod cluster;
pub mod engine;
pub mod merge;
pub mod resolve;
pub mod response;

pub use cluster::Cluster;
pub use engine::{reconcile, Reconciliation};
pub use merge::{merge, MergeSummary};
pub use resolve::{resolve, Resolution, MAX_LINK_DEPTH};
pub use response::ConsolidatedContact;

use crate::contact_db::{Contact, Link, NewContact};

/// Storage primitives the engine needs
pub trait ContactStore {
    /// Contacts whose email equals `email` or whose phone number equals `phone_number`.
    /// An absent argument matches nothing.
    fn find_by_identifier(
        &self,
        email: Option<&str>,
        phone_number: Option<&str>,
    ) -> anyhow::Result<Vec<Contact>>;

    /// The contact `primary_id` plus every contact linked to it.
    fn find_cluster(&self, primary_id: i64) -> anyhow::Result<Vec<Contact>>;

    fn insert(&self, contact: NewContact) -> anyhow::Result<Contact>;

    fn update(&self, id: i64, link: Link) -> anyhow::Result<()>;
}

/// A validated identifier pair; at least one side is present.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifiers {
    email: Option<String>,
    phone_number: Option<String>,
}

impl Identifiers {
    /// Returns `None` when neither identifier is given.
    pub fn new(email: Option<String>, phone_number: Option<String>) -> Option<Self> {
        if email.is_none() && phone_number.is_none() {
            return None;
        }
        Some(Self { email, phone_number })
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number.as_deref()
    }

    pub(crate) fn to_new_contact(&self, link: Link) -> anyhow::Result<NewContact> {
        NewContact::new(self.email.clone(), self.phone_number.clone(), link)
    }
}
