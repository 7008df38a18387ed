//! Bank AML screening server
//!
//! Runs the ingestion service, the fraud-detection service, or both.

mod api;
mod bootstrap;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, Role};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Bank AML screening pipeline
#[derive(Parser, Debug)]
#[command(name = "aml-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file. Defaults apply if it does not exist.
    #[arg(short, long, env = "AML_CONFIG", default_value = "./aml-config.toml")]
    config: PathBuf,

    /// Services to run
    #[command(subcommand)]
    role: Role,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!(role = ?args.role, "Starting aml-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = ConfigLoader::new(&args.config, args.role)
        .load()
        .map_err(|e| {
            tracing::error!("Failed to load configuration: {}", e);
            e
        })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let result = bootstrap::run(config, args.role).await;
    match &result {
        Ok(()) => tracing::info!("Server shutdown complete"),
        Err(e) => tracing::error!(error = %e, "Server stopped with error"),
    }
    result
}

/// Initialize the tracing subscriber with environment-based filtering.
///
/// `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,rdkafka=info"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
