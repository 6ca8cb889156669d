// identity-reconciler/crates/identity-reconciler/src/config.rs

use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::contact_db::DatabaseOptions;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_host: String,
    pub api_port: u16,
    pub database_path: PathBuf,
    pub db_pool_size: u32,
    pub db_busy_timeout_ms: u64,
    pub request_timeout_seconds: u64,
    pub cors_allow_any: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            warn!("Failed to load .env file: {}. Using system environment variables.", e);
        } else {
            info!("Loaded environment variables from .env file");
        }
        Self::from_source(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup; missing keys fall back to defaults.
    pub fn from_source<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cfg = Self {
            api_host: lookup("API_HOST").unwrap_or_else(|| "127.0.0.1".into()),
            api_port: parse_var(&lookup, "API_PORT", 3000)?,
            database_path: lookup("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/contacts.db")),
            db_pool_size: parse_var(&lookup, "DB_POOL_SIZE", 8)?,
            db_busy_timeout_ms: parse_var(&lookup, "DB_BUSY_TIMEOUT_MS", 5000)?,
            request_timeout_seconds: parse_var(&lookup, "REQUEST_TIMEOUT_SECONDS", 30)?,
            cors_allow_any: parse_var(&lookup, "CORS_ALLOW_ANY", true)?,
        };

        if cfg.db_pool_size == 0 {
            return Err(anyhow::anyhow!("DB_POOL_SIZE must be at least 1"));
        }
        if cfg.request_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("REQUEST_TIMEOUT_SECONDS must be at least 1"));
        }
        Ok(cfg)
    }

    pub fn database_options(&self) -> DatabaseOptions {
        DatabaseOptions {
            pool_size: self.db_pool_size,
            busy_timeout: Duration::from_millis(self.db_busy_timeout_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn print_config(&self) {
        info!("Current Configuration:");
        info!("- API: {}:{}", self.api_host, self.api_port);
        info!("- Database Path: {}", self.database_path.display());
        info!("- DB Pool Size: {}", self.db_pool_size);
        info!("- DB Busy Timeout: {}ms", self.db_busy_timeout_ms);
        info!("- Request Timeout: {}s", self.request_timeout_seconds);
        info!("- CORS Allow Any: {}", self.cors_allow_any);
    }

    pub fn api_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.api_host, self.api_port)
            .parse()
            .with_context(|| format!("Invalid API address {}:{}", self.api_host, self.api_port))
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}
