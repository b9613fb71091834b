//! # Tagwire
//!
//! Bridges chat triggers to industrial data sources. Restricted SQL-like
//! query text is translated into reads against a process historian's HTTP
//! endpoint, executed as a dual stream (latest value plus an
//! interval-sampled history) and merged into one newest-first sequence.
//!
//! ## Features
//!
//! - **Restricted SQL**: `SELECT [TOP n] ... FROM ... WHERE ... LIMIT n`, parsed with nom
//! - **Window planning**: ordered rules turn intervals, limits and timestamp predicates into a read window
//! - **Dual-stream execution**: concurrent instant and historical reads with fallback
//! - **Normalization**: three response envelopes, sentinel filtering, deterministic merge
//!
//! ## Modules
//!
//! - [`historian`]: Parser, planner, executor, normalizer and engine
//! - [`sources`]: Data-source trait and registry
//! - [`config`]: TOML configuration with environment overrides
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tagwire::historian::{HistorianEngine, Interval, RawQuery};
//! use tagwire::config::HistorianConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HistorianConfig {
//!         base_url: "http://historian.plant:8080".to_string(),
//!         default_tag: Some("Boiler.Temperature".to_string()),
//!         ..Default::default()
//!     };
//!     let engine = HistorianEngine::from_config(&config)?;
//!
//!     let result = engine
//!         .execute(&RawQuery::new("SELECT TOP 20 * FROM Point").interval(Interval::FiveMinutes))
//!         .await?;
//!
//!     println!(
//!         "{} samples ({} instant, {} historical)",
//!         result.len(),
//!         result.metadata.real_time_count,
//!         result.metadata.historical_count
//!     );
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod historian;
pub mod sources;

// Re-export top-level types for convenience
pub use historian::{
    ExecutionMetadata, ExecutionResult, HistorianEngine, HistorianError, HistorianResult,
    Interval, QueryOptions, QueryType, RawQuery, Sample, SampleValue,
};

pub use sources::{DataSource, HistorianSource, SourceError, SourceRegistry};

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{ApiConfig, Config, ConfigError, HistorianConfig, LoggingConfig};
