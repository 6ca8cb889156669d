use axum::http::StatusCode;
use axum::response::IntoResponse;
use lazy_static::lazy_static;
use prometheus::{Encoder, Histogram, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::sync::OnceLock;
use tracing::warn;

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
}
static REQ_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();
static CONTACTS_CREATED: OnceLock<IntCounterVec> = OnceLock::new();
static CLUSTERS_MERGED: OnceLock<IntCounter> = OnceLock::new();
static RECONCILE_DURATION: OnceLock<Histogram> = OnceLock::new();

/// Register collectors; safe to call more than once.
pub fn init_metrics() -> anyhow::Result<()> {
    let req_counter = IntCounterVec::new(
        prometheus::opts!("requests_total", "Total requests per route"),
        &["route", "status"],
    )?;
    let contacts_created = IntCounterVec::new(
        prometheus::opts!("contacts_created_total", "Contacts written, by link precedence"),
        &["precedence"],
    )?;
    let clusters_merged = IntCounter::new(
        "clusters_merged_total",
        "Primary contacts demoted while merging identity clusters",
    )?;
    let reconcile_duration = Histogram::with_opts(prometheus::HistogramOpts::new(
        "reconcile_duration_seconds",
        "Time spent reconciling one identify request",
    ))?;

    register(REQ_COUNTER.get_or_init(|| req_counter));
    register(CONTACTS_CREATED.get_or_init(|| contacts_created));
    register(CLUSTERS_MERGED.get_or_init(|| clusters_merged));
    register(RECONCILE_DURATION.get_or_init(|| reconcile_duration));
    Ok(())
}

fn register<C>(collector: &C)
where
    C: prometheus::core::Collector + Clone + 'static,
{
    // AlreadyReg on repeated init is expected
    REGISTRY.register(Box::new(collector.clone())).ok();
}

pub fn inc_request(route: &str, status: &str) {
    if let Some(counter) = REQ_COUNTER.get() {
        counter.with_label_values(&[route, status]).inc();
    }
}

pub fn inc_contacts_created(precedence: &str) {
    if let Some(counter) = CONTACTS_CREATED.get() {
        counter.with_label_values(&[precedence]).inc();
    }
}

pub fn inc_clusters_merged(demoted: usize) {
    if let Some(counter) = CLUSTERS_MERGED.get() {
        counter.inc_by(demoted as u64);
    }
}

pub fn observe_reconcile_duration(seconds: f64) {
    if let Some(histogram) = RECONCILE_DURATION.get() {
        histogram.observe(seconds);
    }
}

pub async fn get_metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        buffer,
    )
}
