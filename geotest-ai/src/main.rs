//! geotest-ai - GEO analysis service
//!
//! Default port: 5780 (override with `--port` or `[server] port`).

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use geotest_ai::config::Credentials;
use geotest_ai::providers::HttpTransport;
use geotest_ai::AppState;
use geotest_common::events::EventBus;

#[derive(Debug, Parser)]
#[command(name = "geotest-ai", version, about = "GEO readiness analysis service")]
struct Args {
    /// TOML config file (overrides GEOTEST_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port (overrides the config file)
    #[arg(short, long, env = "GEOTEST_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = geotest_common::config::load_or_default(args.config.as_deref())?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting geotest-ai (GEO analysis) service");
    info!(
        "Version: {} ({}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let credentials = Credentials::resolve(&config.providers);

    let transport = HttpTransport::new()
        .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

    let event_bus = EventBus::new(256);
    let state = AppState::new(&config.analysis, &credentials, Arc::new(transport), event_bus);

    if state.readiness.ready {
        info!(
            valid = ?state.readiness.valid_providers,
            "Provider credentials ready"
        );
    } else {
        warn!(
            valid_count = state.readiness.valid_count,
            required = state.readiness.required,
            invalid = ?state.readiness.invalid_providers,
            "Too few valid provider credentials, analysis will rely on mock results"
        );
    }

    let app = geotest_ai::build_router(state);

    let port = args.port.unwrap_or(config.server.port);
    let addr = format!("{}:{}", config.server.host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
