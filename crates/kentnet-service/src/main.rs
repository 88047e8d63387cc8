//! Kent Network API - HTTP service over the sensor metadata and reading stores.
//!
//! Run with: `cargo run -p kentnet-service`

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use axum::Router;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use kentnet_service::{AppState, Config, api};

/// Kent Network API - sensor telemetry over HTTP.
#[derive(Parser, Debug)]
#[command(name = "kentnet-service")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config and environment).
    #[arg(short, long)]
    bind: Option<String>,

    /// Ignore SERVERBIND, COUCHHOST and the other environment overrides.
    #[arg(long)]
    no_env: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("kentnet_service=info".parse()?)
                .add_directive("kentnet_store=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let config = load_config(&args)?;
    config.validate()?;

    info!(
        "Using CouchDB {} (db {}) and InfluxDB {} (db {}, measurement {})",
        config.couch.host,
        config.couch.db,
        config.influx.host,
        config.influx.db,
        config.influx.measurement
    );

    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", config.server.bind))?;

    let state = AppState::connect(config)?;

    let app = Router::new()
        .merge(api::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Layer the config file, environment and command-line flags.
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    if !args.no_env {
        config.apply_env_overrides(|name| std::env::var(name).ok());
    }

    if let Some(bind) = &args.bind {
        config.server.bind = bind.clone();
    }

    Ok(config)
}
