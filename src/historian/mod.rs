//! Historian query engine
//!
//! Translates restricted SQL-like text into reads against a process
//! historian's `/pi/trn` endpoint and merges the results.
//!
//! # Components
//!
//! - [`parser`]: declarative text to [`ParsedQuery`]
//! - [`planner`]: ordered rules resolving a [`TimeWindow`] per leg
//! - [`executor`]: one GET per leg through a [`HistorianTransport`]
//! - [`normalize`]: envelope flattening, filtering, merging
//! - [`engine`]: the orchestrator callers use
//!
//! # Example
//!
//! ```rust,no_run
//! use tagwire::config::HistorianConfig;
//! use tagwire::historian::{HistorianEngine, Interval, RawQuery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HistorianConfig {
//!         base_url: "http://historian.plant:8080".to_string(),
//!         ..Default::default()
//!     };
//!     let engine = HistorianEngine::from_config(&config)?;
//!
//!     let query = RawQuery::new("SELECT * FROM Point WHERE tag = 'Boiler.Temp' LIMIT 10")
//!         .interval(Interval::OneMinute);
//!     let result = engine.execute(&query).await?;
//!
//!     for sample in &result.samples {
//!         println!("{} {} {}", sample.id, sample.timestamp, sample.value);
//!     }
//!     Ok(())
//! }
//! ```

pub mod ast;
pub mod engine;
pub mod error;
pub mod executor;
pub mod input;
pub mod normalize;
pub mod parser;
pub mod planner;
pub mod transport;
pub mod types;

pub use ast::{ParsedQuery, WhereConditions};
pub use engine::{HistorianEngine, Stage};
pub use error::{HistorianError, HistorianResult, TransportError, UpstreamError};
pub use executor::{LegOutcome, StreamExecutor};
pub use input::{classify, Preset, QueryInput};
pub use parser::parse_query;
pub use planner::{instant_window, plan, PlanRequest};
pub use transport::{HistorianTransport, ReqwestTransport};
pub use types::{
    ExecutionMetadata, ExecutionResult, Interval, Leg, LegDiagnostics, PlanRule, QueryOptions,
    QueryType, RawQuery, Sample, SampleValue, TimeMarker, TimeUnit, TimeWindow,
};
