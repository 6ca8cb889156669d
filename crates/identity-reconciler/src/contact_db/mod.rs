//! Contact database module - SQLite-based storage for contact records
pub mod contact_store;
pub mod migration;
pub mod schema;

pub use contact_store::SqliteContactStore;
pub use migration::MigrationManager;
pub use schema::*;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::TransactionBehavior;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Connection pool settings
#[derive(Debug, Clone, Copy)]
pub struct DatabaseOptions {
    pub pool_size: u32,
    pub busy_timeout: Duration,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            pool_size: 8,
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

pub struct ContactDatabase {
    pool: Arc<Pool<SqliteConnectionManager>>,
    on_disk: bool,
}

impl ContactDatabase {
    pub fn new(db_path: &Path) -> anyhow::Result<Self> {
        Self::open(db_path, DatabaseOptions::default())
    }

    pub fn open(db_path: &Path, options: DatabaseOptions) -> anyhow::Result<Self> {
        info!("Opening contact database at: {}", db_path.display());
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let busy_timeout = options.busy_timeout;
        let manager = SqliteConnectionManager::file(db_path)
            .with_flags(
                rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                    | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                    | rusqlite::OpenFlags::SQLITE_OPEN_FULL_MUTEX,
            )
            .with_init(move |conn| {
                conn.busy_timeout(busy_timeout)?;
                conn.execute_batch(
                    "PRAGMA foreign_keys = ON;
                     PRAGMA synchronous = NORMAL;",
                )
            });
        let pool = Pool::builder()
            .max_size(options.pool_size.max(1))
            .build(manager)
            .map_err(|e| anyhow::anyhow!("Failed to create connection pool: {}", e))?;

        {
            let mut conn = pool.get()?;
            let journal_mode: String =
                conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
            if !journal_mode.eq_ignore_ascii_case("wal") {
                warn!("WAL journal mode unavailable, using {}", journal_mode);
            }
            let mut migrator = MigrationManager::new(&mut conn);
            migrator.initialize_database()?;
        }
        info!("Contact database initialized successfully");
        Ok(Self {
            pool: Arc::new(pool),
            on_disk: true,
        })
    }

    /// Every pooled in-memory connection would be its own database, so the pool holds one.
    pub fn new_in_memory() -> anyhow::Result<Self> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| anyhow::anyhow!("Failed to create connection pool: {}", e))?;
        {
            let mut conn = pool.get()?;
            MigrationManager::new(&mut conn).initialize_database()?;
        }
        Ok(Self {
            pool: Arc::new(pool),
            on_disk: false,
        })
    }

    fn get_conn(&self) -> anyhow::Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| anyhow::anyhow!("Failed to get connection from pool: {}", e))
    }

    /// Run `f` inside one `BEGIN IMMEDIATE` transaction.
    ///
    /// The write lock is taken before the first read, so two calls touching the same
    /// identifiers cannot both observe "no match" and insert competing primaries. Commits on
    /// `Ok`, rolls back on `Err`.
    pub fn with_transaction<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&SqliteContactStore<'_>) -> anyhow::Result<T>,
    {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = f(&SqliteContactStore::new(&tx));
        match result {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!("Rollback failed after error '{}': {}", e, rollback_err);
                }
                Err(e)
            }
        }
    }

    /// Run read-only work against a pooled connection
    pub fn with_store<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&SqliteContactStore<'_>) -> anyhow::Result<T>,
    {
        let conn = self.get_conn()?;
        f(&SqliteContactStore::new(&conn))
    }

    pub fn get_contact(&self, id: i64) -> anyhow::Result<Option<Contact>> {
        self.with_store(|store| store.get_contact(id))
    }

    pub fn list_contacts(&self) -> anyhow::Result<Vec<Contact>> {
        self.with_store(|store| store.list_contacts())
    }

    pub fn get_stats(&self) -> anyhow::Result<DatabaseStats> {
        let conn = self.get_conn()?;
        Ok(migration::get_database_stats(&conn)?)
    }
}

impl Drop for ContactDatabase {
    fn drop(&mut self) {
        if !self.on_disk {
            return;
        }
        if let Ok(conn) = self.pool.get() {
            let _ = conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);");
        }
    }
}
