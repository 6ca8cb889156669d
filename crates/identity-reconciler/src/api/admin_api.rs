//! Read-only admin endpoints over the contact store
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{debug, error};

use crate::api::ErrorResponse;
use crate::contact_db::{Contact, DatabaseStats};
use crate::metrics;
use crate::shared_state::AppState;

pub const WELCOME_TEXT: &str = "Welcome to the identity reconciliation service!";

pub async fn welcome() -> &'static str {
    WELCOME_TEXT
}

pub async fn get_contact(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Contact>, (StatusCode, Json<ErrorResponse>)> {
    debug!("Fetching contact {}", id);

    match state.identity_worker.get_contact(id).await {
        Ok(Some(contact)) => {
            metrics::inc_request("get_contact", "ok");
            Ok(Json(contact))
        }
        Ok(None) => {
            metrics::inc_request("get_contact", "not_found");
            Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Contact {} not found", id),
                }),
            ))
        }
        Err(e) => {
            error!("Failed to fetch contact {}: {:#}", id, e);
            metrics::inc_request("get_contact", "error");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Database error: {}", e),
                }),
            ))
        }
    }
}

pub async fn get_stats(
    State(state): State<AppState>,
) -> Result<Json<DatabaseStats>, (StatusCode, Json<ErrorResponse>)> {
    match state.identity_worker.get_stats().await {
        Ok(stats) => {
            metrics::inc_request("admin_stats", "ok");
            Ok(Json(stats))
        }
        Err(e) => {
            error!("Failed to collect database stats: {:#}", e);
            metrics::inc_request("admin_stats", "error");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Database error: {}", e),
                }),
            ))
        }
    }
}
