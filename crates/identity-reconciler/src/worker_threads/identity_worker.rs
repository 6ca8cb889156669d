//! Identity worker implementation
//!
//! Runs reconciliations and admin reads on the blocking pool so the async runtime never waits
//! on SQLite.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::{
    contact_db::{Contact, ContactDatabase, DatabaseStats},
    reconcile::{reconcile, Identifiers, Reconciliation},
};

pub struct IdentityWorker {
    database: Arc<ContactDatabase>,
    deadline: Option<Duration>,
}

impl IdentityWorker {
    pub fn new(database: Arc<ContactDatabase>) -> Self {
        Self {
            database,
            deadline: None,
        }
    }

    /// Roll back any reconciliation still uncommitted `deadline` after it was submitted.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Reconcile one identifier pair inside a single immediate transaction.
    ///
    /// Returns the reconciliation together with the time it took. The blocking task outlives a
    /// dropped caller, so a request cancelled by the HTTP timeout still runs to the commit
    /// check; past the deadline it rolls back instead. A commit that lands just before the
    /// deadline while the caller already gave up is harmless: replaying the same request is a
    /// pure lookup.
    pub async fn identify(&self, identifiers: Identifiers) -> anyhow::Result<(Reconciliation, Duration)> {
        debug!(
            email = identifiers.email(),
            phone_number = identifiers.phone_number(),
            "Identity worker reconciling"
        );

        let database = Arc::clone(&self.database);
        let started = Instant::now();
        let deadline = self.deadline.map(|limit| started + limit);
        let reconciliation = run_blocking(move || {
            database.with_transaction(|store| {
                let reconciliation = reconcile(store, &identifiers)?;
                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    warn!(
                        writes = reconciliation.writes(),
                        "Reconciliation missed its deadline, rolling back"
                    );
                    return Err(anyhow::anyhow!("reconciliation exceeded the request deadline"));
                }
                Ok(reconciliation)
            })
        })
        .await?;
        let elapsed = started.elapsed();

        info!(
            primary_contact_id = reconciliation.contact.primary_contact_id,
            writes = reconciliation.writes(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Reconciled identity"
        );
        Ok((reconciliation, elapsed))
    }

    pub async fn get_contact(&self, id: i64) -> anyhow::Result<Option<Contact>> {
        let database = Arc::clone(&self.database);
        run_blocking(move || database.get_contact(id)).await
    }

    pub async fn get_stats(&self) -> anyhow::Result<DatabaseStats> {
        debug!("Identity worker getting statistics");
        let database = Arc::clone(&self.database);
        run_blocking(move || database.get_stats()).await
    }
}

async fn run_blocking<T, F>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow::anyhow!("Blocking task failed: {}", e))?
}
