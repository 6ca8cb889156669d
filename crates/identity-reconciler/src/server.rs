//! HTTP server startup
//!
//! Opens the contact database, builds the shared [`AppState`] and serves the Axum router.

use std::sync::Arc;
use tracing::{info, warn};

use crate::{config::Config, contact_db::ContactDatabase, shared_state::AppState};

pub async fn run_server(cfg: Config) -> anyhow::Result<()> {
    crate::telemetry::init_tracing();
    crate::metrics::init_metrics()?;
    cfg.print_config();

    let database = match ContactDatabase::open(&cfg.database_path, cfg.database_options()) {
        Ok(db) => {
            info!("Contact database initialized at: {}", cfg.database_path.display());
            Arc::new(db)
        }
        Err(e) => {
            warn!(
                "Failed to initialize contact database: {:#}. Falling back to in-memory.",
                e
            );
            Arc::new(ContactDatabase::new_in_memory()?)
        }
    };

    let addr = cfg.api_addr()?;
    let state = AppState::new(cfg, database);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, build_router(state)).await?;

    Ok(())
}

pub fn build_router(state: AppState) -> axum::Router {
    use axum::{
        routing::{get, post},
        Router,
    };
    use tower_http::{
        cors::{Any, CorsLayer},
        timeout::TimeoutLayer,
        trace::TraceLayer,
    };

    let timeout = state.config.request_timeout();
    let cors_allow_any = state.config.cors_allow_any;

    let router = Router::new()
        .route("/", get(crate::api::admin_api::welcome))
        .route("/identify", post(crate::api::identify_api::identify))
        .route("/contacts/:id", get(crate::api::admin_api::get_contact))
        .route("/admin/stats", get(crate::api::admin_api::get_stats))
        .route("/metrics", get(crate::metrics::get_metrics))
        .route("/healthz", get(|| async { "OK" }));

    let router = if cors_allow_any {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_headers(Any),
        )
    } else {
        router
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .with_state(state)
}
