//! Data Sources
//!
//! Capability interface the chat trigger layer uses to talk to industrial
//! data sources, plus the registry mapping a source kind to its
//! constructor.
//!
//! Only the historian source ships today.

mod historian;
mod registry;

pub use historian::HistorianSource;
pub use registry::{SourceConstructor, SourceRegistry};

use async_trait::async_trait;
use serde::Serialize;

use crate::historian::{ExecutionResult, HistorianError, Interval, QueryOptions};

/// Raw per-source settings, as stored by the caller
pub type SourceSettings = serde_json::Value;

/// Common trait for all data sources
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Type tag this source is registered under
    fn kind(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// Tables, columns and intervals for query builders
    fn schema(&self) -> SourceSchema;

    /// Verify the source answers a minimal read
    async fn test_connection(&self) -> Result<ConnectionReport, SourceError>;

    /// Execute query text with caller options
    async fn execute(
        &self,
        query: &str,
        options: QueryOptions,
    ) -> Result<ExecutionResult, SourceError>;
}

/// Schema exposed to query pickers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSchema {
    pub kind: String,
    pub tables: Vec<TableSchema>,
    pub intervals: Vec<Interval>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
    pub description: String,
}

impl ColumnSchema {
    pub fn new(name: &str, data_type: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
            description: description.to_string(),
        }
    }
}

/// Outcome of a successful connection test
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionReport {
    pub kind: String,
    /// Tag the probe read
    pub tag: String,
    /// Timestamp of the freshest sample, if the tag had one
    pub latest_timestamp: Option<String>,
    pub elapsed_ms: u64,
}

/// Errors that can occur during data source operations
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Unknown source kind: {0}")]
    UnknownKind(String),

    #[error("Invalid source settings: {0}")]
    Settings(String),

    #[error(transparent)]
    Historian(#[from] HistorianError),
}
