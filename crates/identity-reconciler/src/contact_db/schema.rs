//! Database schema definitions for the contact store
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Link of a contact to its identity cluster.
///
/// A secondary always points at the primary of its cluster; chains of
/// secondaries are not representable here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "linkPrecedence", rename_all = "lowercase")]
pub enum Link {
    Primary,
    Secondary {
        #[serde(rename = "linkedId")]
        primary_id: i64,
    },
}

impl Link {
    pub fn precedence(&self) -> LinkPrecedence {
        match self {
            Link::Primary => LinkPrecedence::Primary,
            Link::Secondary { .. } => LinkPrecedence::Secondary,
        }
    }

    pub fn linked_id(&self) -> Option<i64> {
        match self {
            Link::Primary => None,
            Link::Secondary { primary_id } => Some(*primary_id),
        }
    }

    /// Rebuild a link from its two persisted columns.
    pub fn from_columns(precedence: &str, linked_id: Option<i64>) -> anyhow::Result<Self> {
        match (LinkPrecedence::parse(precedence)?, linked_id) {
            (LinkPrecedence::Primary, None) => Ok(Link::Primary),
            (LinkPrecedence::Secondary, Some(primary_id)) => Ok(Link::Secondary { primary_id }),
            (LinkPrecedence::Primary, Some(id)) => {
                Err(anyhow::anyhow!("primary contact carries linked_id {}", id))
            }
            (LinkPrecedence::Secondary, None) => {
                Err(anyhow::anyhow!("secondary contact has no linked_id"))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPrecedence {
    Primary,
    Secondary,
}

impl LinkPrecedence {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkPrecedence::Primary => "primary",
            LinkPrecedence::Secondary => "secondary",
        }
    }

    pub fn parse(value: &str) -> anyhow::Result<Self> {
        match value {
            "primary" => Ok(LinkPrecedence::Primary),
            "secondary" => Ok(LinkPrecedence::Secondary),
            other => Err(anyhow::anyhow!("unknown link precedence '{}'", other)),
        }
    }
}

/// One stored observation of an (email, phone number) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: i64,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    #[serde(flatten)]
    pub link: Link,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Contact {
    pub fn is_primary(&self) -> bool {
        matches!(self.link, Link::Primary)
    }

    /// Id of the primary this contact belongs to (itself when primary).
    pub fn primary_id(&self) -> i64 {
        match self.link {
            Link::Primary => self.id,
            Link::Secondary { primary_id } => primary_id,
        }
    }
}

/// Fields for a contact that has not been stored yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewContact {
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub link: Link,
}

impl NewContact {
    /// Fails when neither identifier is set; such a row would carry no identity.
    pub fn new(email: Option<String>, phone_number: Option<String>, link: Link) -> anyhow::Result<Self> {
        if email.is_none() && phone_number.is_none() {
            return Err(anyhow::anyhow!("contact needs an email or a phone number"));
        }
        Ok(Self { email, phone_number, link })
    }
}

/// Row counts for the admin surface
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub total_contacts: i64,
    pub primary_contacts: i64,
    pub secondary_contacts: i64,
    pub database_size_bytes: i64,
}

pub const SCHEMA_SQL: &str = include_str!("migrations/001_initial.sql");

pub const CONTACT_COLUMNS: &str =
    "id, email, phone_number, linked_id, link_precedence, created_at, updated_at, deleted_at";
