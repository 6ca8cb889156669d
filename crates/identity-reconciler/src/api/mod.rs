//! API module - HTTP handlers for identify and admin routes

pub mod admin_api;
pub mod identify_api;

use serde::{Deserialize, Serialize};

pub use admin_api::{get_contact, get_stats, welcome};
pub use identify_api::{identify, IdentifyRequest, IdentifyResponse};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
