// identity-reconciler/crates/identity-reconciler/src/lib.rs

pub mod config;
pub mod contact_db;
pub mod memory;
pub mod reconcile;
pub mod telemetry;
pub mod worker_threads;

#[cfg(feature = "cli")]
pub mod api;
#[cfg(feature = "cli")]
pub mod metrics;
#[cfg(feature = "cli")]
pub mod server;
#[cfg(feature = "cli")]
pub mod shared_state;

// Public API exports
pub use config::Config;
pub use contact_db::{Contact, ContactDatabase, DatabaseStats, Link, LinkPrecedence};
pub use memory::InMemoryContactStore;
pub use reconcile::{reconcile, ConsolidatedContact, ContactStore, Identifiers, Reconciliation};
pub use worker_threads::IdentityWorker;

#[cfg(feature = "cli")]
pub use server::{build_router, run_server};
