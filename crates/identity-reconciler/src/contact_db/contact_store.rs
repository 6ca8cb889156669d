//! SQLite-backed contact storage operations
use crate::contact_db::schema::*;
use crate::reconcile::ContactStore;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, warn};

/// Contact store over a borrowed connection.
///
/// Borrowing lets the caller decide the transaction scope: the reconciliation path hands in an
/// immediate transaction so every read and write of one request runs under the same write lock.
pub struct SqliteContactStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteContactStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn get_contact(&self, id: i64) -> anyhow::Result<Option<Contact>> {
        let sql = format!("SELECT {} FROM contacts WHERE id = ?1", CONTACT_COLUMNS);
        let contact = self
            .conn
            .query_row(&sql, [id], |row| Ok(Self::row_to_contact(row)))
            .optional()?;
        contact.transpose()
    }

    /// Every stored contact, oldest first
    pub fn list_contacts(&self) -> anyhow::Result<Vec<Contact>> {
        let sql = format!("SELECT {} FROM contacts ORDER BY created_at, id", CONTACT_COLUMNS);
        self.query_contacts(&sql, params![])
    }

    fn query_contacts(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> anyhow::Result<Vec<Contact>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut contacts = Vec::new();
        while let Some(row) = rows.next()? {
            contacts.push(Self::row_to_contact(row)?);
        }
        Ok(contacts)
    }

    pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_datetime_safe(datetime_str: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(datetime_str) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(datetime_str, "%Y-%m-%d %H:%M:%S") {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(datetime_str, "%Y-%m-%d %H:%M:%S%.f") {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
        None
    }

    fn parse_required_datetime(value: &str, column: &str, id: i64) -> anyhow::Result<DateTime<Utc>> {
        Self::parse_datetime_safe(value).ok_or_else(|| {
            anyhow::anyhow!("contact {} has unparseable {} '{}'", id, column, value)
        })
    }

    fn row_to_contact(row: &Row) -> anyhow::Result<Contact> {
        let id: i64 = row.get(0)?;
        let linked_id: Option<i64> = row.get(3)?;
        let precedence: String = row.get(4)?;
        let link = Link::from_columns(&precedence, linked_id)
            .map_err(|e| anyhow::anyhow!("contact {}: {}", id, e))?;

        let created_at = Self::parse_required_datetime(&row.get::<_, String>(5)?, "created_at", id)?;
        let updated_at = Self::parse_required_datetime(&row.get::<_, String>(6)?, "updated_at", id)?;
        let deleted_at = row
            .get::<_, Option<String>>(7)?
            .and_then(|value| {
                let parsed = Self::parse_datetime_safe(&value);
                if parsed.is_none() {
                    warn!("Failed parse deleted_at for contact {}", id);
                }
                parsed
            });

        Ok(Contact {
            id,
            email: row.get(1)?,
            phone_number: row.get(2)?,
            link,
            created_at,
            updated_at,
            deleted_at,
        })
    }
}

impl ContactStore for SqliteContactStore<'_> {
    fn find_by_identifier(
        &self,
        email: Option<&str>,
        phone_number: Option<&str>,
    ) -> anyhow::Result<Vec<Contact>> {
        if email.is_none() && phone_number.is_none() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM contacts
             WHERE (?1 IS NOT NULL AND email = ?1) OR (?2 IS NOT NULL AND phone_number = ?2)
             ORDER BY created_at, id",
            CONTACT_COLUMNS
        );
        self.query_contacts(&sql, params![email, phone_number])
    }

    fn find_cluster(&self, primary_id: i64) -> anyhow::Result<Vec<Contact>> {
        let sql = format!(
            "SELECT {} FROM contacts WHERE id = ?1 OR linked_id = ?1 ORDER BY created_at, id",
            CONTACT_COLUMNS
        );
        self.query_contacts(&sql, params![primary_id])
    }

    fn insert(&self, contact: NewContact) -> anyhow::Result<Contact> {
        let now = Utc::now();
        let now_str = Self::format_timestamp(&now);
        self.conn.execute(
            "INSERT INTO contacts
             (email, phone_number, linked_id, link_precedence, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                contact.email,
                contact.phone_number,
                contact.link.linked_id(),
                contact.link.precedence().as_str(),
                &now_str,
                &now_str,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!("Inserted {} contact {}", contact.link.precedence().as_str(), id);

        Ok(Contact {
            id,
            email: contact.email,
            phone_number: contact.phone_number,
            link: contact.link,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    fn update(&self, id: i64, link: Link) -> anyhow::Result<()> {
        let now = Self::format_timestamp(&Utc::now());
        let updated = self.conn.execute(
            "UPDATE contacts SET link_precedence = ?1, linked_id = ?2, updated_at = ?3 WHERE id = ?4",
            params![link.precedence().as_str(), link.linked_id(), now, id],
        )?;
        if updated == 0 {
            return Err(anyhow::anyhow!("Contact {} not found", id));
        }
        debug!("Updated contact {} link to {:?}", id, link);
        Ok(())
    }
}
