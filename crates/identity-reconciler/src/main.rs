// identity-reconciler/crates/identity-reconciler/src/main.rs

#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use identity_reconciler::{config::Config, run_server};

#[cfg(feature = "cli")]
#[derive(Debug, Parser)]
#[command(name = "identity-reconciler", version, about = "Identity reconciliation HTTP service")]
struct Cli {
    /// Interface to bind (overrides API_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides API_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// SQLite database file (overrides DATABASE_PATH)
    #[arg(long)]
    database_path: Option<std::path::PathBuf>,
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut cfg = Config::from_env()?;

    if let Some(host) = cli.host {
        cfg.api_host = host;
    }
    if let Some(port) = cli.port {
        cfg.api_port = port;
    }
    if let Some(path) = cli.database_path {
        cfg.database_path = path;
    }

    run_server(cfg).await
}

#[cfg(not(feature = "cli"))]
fn main() {
    println!("CLI feature not enabled. Enable with --features cli");
}
