//! Application state shared by every HTTP handler

use std::sync::Arc;
use tracing::info;

use crate::{config::Config, contact_db::ContactDatabase, worker_threads::IdentityWorker};

/// Single state type used by the Axum router
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub identity_worker: Arc<IdentityWorker>,
}

impl AppState {
    pub fn new(config: Config, database: Arc<ContactDatabase>) -> Self {
        info!("Initializing application state");
        let identity_worker = IdentityWorker::new(database).with_deadline(config.request_timeout());
        Self {
            config: Arc::new(config),
            identity_worker: Arc::new(identity_worker),
        }
    }
}
