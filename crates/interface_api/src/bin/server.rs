//! Payment stage engine - API server binary
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration and the bundled catalog
//! cargo run --bin paystage-api
//!
//! # Run with environment variables
//! PAYSTAGE_PORT=9090 PAYSTAGE_CATALOG_SEED=./catalog.json cargo run --bin paystage-api
//! ```
//!
//! # Environment Variables
//!
//! * `PAYSTAGE_HOST` - Server host (default: 0.0.0.0)
//! * `PAYSTAGE_PORT` - Server port (default: 8080)
//! * `PAYSTAGE_JWT_SECRET` - JWT signing secret (required in production)
//! * `PAYSTAGE_JWT_EXPIRATION_SECS` - JWT token expiration in seconds (default: 3600)
//! * `PAYSTAGE_LOG_LEVEL` - Log level: trace, debug, info, warn, error (default: info)
//! * `PAYSTAGE_LOG_FORMAT` - `json` for structured output (default: text)
//! * `PAYSTAGE_CURRENCY` - Company currency (default: MAD)
//! * `PAYSTAGE_CATALOG_SEED` - JSON catalog of accounts, journals and stages
//! * `PAYSTAGE_ENGINE__ALLOCATION_ORDER` - `largest_remaining_first` or `smallest_remaining_first`
//! * `PAYSTAGE_ENGINE__COUNTERPARTY_BLOCKING` - Block partners with defaulted payments (default: true)

use std::net::SocketAddr;

use anyhow::Context;
use interface_api::{build_state, config::ApiConfig, create_router};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = load_config();
    init_tracing(&config);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        currency = %config.currency,
        "Starting payment stage API server"
    );

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .with_context(|| format!("Invalid server address {}", config.server_addr()))?;

    let state = build_state(config).context("Failed to load the stage catalog")?;
    let app = create_router(state);

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Loads configuration from the environment, falling back to defaults
fn load_config() -> ApiConfig {
    ApiConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Invalid PAYSTAGE_ configuration ({}), using defaults", e);
        ApiConfig::default()
    })
}

/// Initializes the tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(config: &ApiConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().with_target(true)).init();
    }
}

/// Waits for Ctrl+C or SIGTERM so in-flight requests can complete
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
