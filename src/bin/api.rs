//! Tagwire API Server
//!
//! Run with: cargo run --bin tagwire-api
//!
//! # Configuration
//!
//! Reads `config.toml` from the standard locations (see
//! [`Config::load_default`]) and applies `TAGWIRE_*` environment overrides:
//! - `TAGWIRE_HISTORIAN_URL`: Historian base URL
//! - `TAGWIRE_DEFAULT_TAG`: Tag used when a query names none
//! - `TAGWIRE_API_HOST` / `TAGWIRE_API_PORT`: Bind address (default: 0.0.0.0:8086)
//! - `RUST_LOG`: Log filter (overrides `logging.level`)

use std::sync::Arc;

use tagwire::api::{serve, AppState};
use tagwire::config::Config;
use tagwire::sources::SourceRegistry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_default();
    config.logging.init_subscriber();

    tracing::info!("Starting Tagwire API server v{}", env!("CARGO_PKG_VERSION"));

    if config.historian.base_url.is_empty() {
        tracing::warn!("No historian base URL configured; queries will fail until TAGWIRE_HISTORIAN_URL is set");
    } else {
        tracing::info!("Historian: {}", config.historian.base_url);
    }

    let registry = SourceRegistry::with_builtin();
    let settings = serde_json::to_value(&config.historian)?;
    let source = registry.build("historian", &settings)?;

    match source.test_connection().await {
        Ok(report) => tracing::info!(
            tag = %report.tag,
            elapsed_ms = report.elapsed_ms,
            "Historian connection verified"
        ),
        Err(e) => tracing::warn!("Historian not available: {} (readiness will fail)", e),
    }

    let state = AppState::new(Arc::from(source), registry.kinds(), config.api.clone());

    tracing::info!("Starting server on {}", config.api.addr());
    serve(state, &config.api).await?;

    tracing::info!("Tagwire API server stopped");
    Ok(())
}
