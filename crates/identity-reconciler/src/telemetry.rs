// identity-reconciler/crates/identity-reconciler/src/telemetry.rs

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

/// Directives used when `RUST_LOG` is unset or unparseable
pub const DEFAULT_FILTER: &str = "info";

/// Build the filter from `RUST_LOG`-style directives, falling back to [`DEFAULT_FILTER`].
pub fn env_filter(directives: Option<&str>) -> EnvFilter {
    match directives {
        Some(directives) => EnvFilter::try_new(directives).unwrap_or_else(|e| {
            eprintln!("Ignoring invalid RUST_LOG '{}': {}", directives, e);
            EnvFilter::new(DEFAULT_FILTER)
        }),
        None => EnvFilter::new(DEFAULT_FILTER),
    }
}

/// Install the global subscriber. Returns `false` when one was already installed.
pub fn init_tracing() -> bool {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = env_filter(directives.as_deref());
    let level = filter.max_level_hint().unwrap_or(LevelFilter::INFO);

    // reconciliations run on blocking-pool threads; the thread name tells them apart
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_thread_names(true)
        .compact()
        .finish();

    let installed = tracing::subscriber::set_global_default(subscriber).is_ok();
    if installed {
        tracing::debug!(max_level = %level, "Tracing initialized");
    }
    installed
}
