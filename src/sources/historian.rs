//! Historian Source
//!
//! Adapts [`HistorianEngine`] to the [`DataSource`] trait.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::{
    ColumnSchema, ConnectionReport, DataSource, SourceError, SourceSchema, SourceSettings,
    TableSchema,
};
use crate::config::HistorianConfig;
use crate::historian::{
    ExecutionResult, HistorianEngine, HistorianTransport, Interval, QueryOptions, RawQuery,
};

/// Table name the query language reads from
const POINT_TABLE: &str = "Point";

/// Process historian reachable over HTTP
pub struct HistorianSource {
    engine: HistorianEngine,
    config: HistorianConfig,
}

impl HistorianSource {
    pub const KIND: &'static str = "historian";

    /// Source using the reqwest transport
    pub fn from_config(config: HistorianConfig) -> Result<Self, SourceError> {
        let engine = HistorianEngine::from_config(&config)?;
        Ok(Self { engine, config })
    }

    /// Source over an explicit transport
    pub fn with_transport(config: HistorianConfig, transport: Arc<dyn HistorianTransport>) -> Self {
        let engine = HistorianEngine::new(&config, transport);
        Self { engine, config }
    }

    /// Registry constructor: settings are a serialized [`HistorianConfig`]
    pub fn build(settings: &SourceSettings) -> Result<Box<dyn DataSource>, SourceError> {
        let config = if settings.is_null() {
            HistorianConfig::default()
        } else {
            serde_json::from_value(settings.clone())
                .map_err(|e| SourceError::Settings(e.to_string()))?
        };
        Ok(Box::new(Self::from_config(config)?))
    }

    pub fn config(&self) -> &HistorianConfig {
        &self.config
    }

    pub fn engine(&self) -> &HistorianEngine {
        &self.engine
    }
}

#[async_trait]
impl DataSource for HistorianSource {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn description(&self) -> &str {
        "Process historian (dual-stream instant and historical reads)"
    }

    fn schema(&self) -> SourceSchema {
        SourceSchema {
            kind: Self::KIND.to_string(),
            tables: vec![TableSchema {
                name: POINT_TABLE.to_string(),
                columns: vec![
                    ColumnSchema::new("tag", "string", "Historian tag name"),
                    ColumnSchema::new("timestamp", "datetime", "Sample timestamp"),
                    ColumnSchema::new("value", "number", "Sample value"),
                ],
            }],
            intervals: Interval::SELECTABLE.to_vec(),
        }
    }

    async fn test_connection(&self) -> Result<ConnectionReport, SourceError> {
        let tag = self.config.default_tag().ok_or_else(|| {
            SourceError::Settings("a default tag is required to test the connection".to_string())
        })?;

        let started = Instant::now();
        match self.engine.read_latest(tag).await {
            Ok(latest) => {
                let report = ConnectionReport {
                    kind: Self::KIND.to_string(),
                    tag: tag.to_string(),
                    latest_timestamp: latest.map(|sample| sample.timestamp),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                };
                info!(tag = %tag, elapsed_ms = report.elapsed_ms, "Historian connection test passed");
                Ok(report)
            }
            Err(e) => {
                warn!(tag = %tag, error = %e, "Historian connection test failed");
                Err(e.into())
            }
        }
    }

    async fn execute(
        &self,
        query: &str,
        options: QueryOptions,
    ) -> Result<ExecutionResult, SourceError> {
        let raw = RawQuery {
            text: query.to_string(),
            options,
        };
        Ok(self.engine.execute(&raw).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::historian::error::{HistorianError, TransportError};
    use crate::historian::transport::mock::MockTransport;
    use serde_json::json;

    fn config(default_tag: Option<&str>) -> HistorianConfig {
        HistorianConfig {
            base_url: "http://historian.local".to_string(),
            default_tag: default_tag.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_schema() {
        let source = HistorianSource::with_transport(
            config(None),
            Arc::new(MockTransport::always(json!([]))),
        );
        let schema = source.schema();
        assert_eq!(schema.tables[0].name, "Point");
        let columns: Vec<&str> = schema.tables[0]
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(columns, vec!["tag", "timestamp", "value"]);
        assert_eq!(schema.intervals.len(), 10);
        assert!(!schema.intervals.contains(&Interval::OneSecond));
    }

    #[tokio::test]
    async fn test_connection_reads_default_tag() {
        let transport = Arc::new(MockTransport::always(json!([
            {"v0": "2025-01-01T10:00:00", "v1": 1.0}
        ])));
        let source = HistorianSource::with_transport(config(Some("T1")), transport.clone());

        let report = source.test_connection().await.unwrap();
        assert_eq!(report.tag, "T1");
        assert_eq!(report.latest_timestamp.as_deref(), Some("2025-01-01T10:00:00"));
        assert_eq!(transport.call_count(), 1);
        assert!(transport.requests()[0].is_instant());
    }

    #[tokio::test]
    async fn test_connection_without_default_tag() {
        let transport = Arc::new(MockTransport::always(json!([])));
        let source = HistorianSource::with_transport(config(None), transport.clone());

        let err = source.test_connection().await.unwrap_err();
        assert!(matches!(err, SourceError::Settings(_)));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_connection_failure() {
        let transport = Arc::new(MockTransport::new(|_| {
            Err(TransportError::Timeout { timeout_secs: 10 })
        }));
        let source = HistorianSource::with_transport(config(Some("T1")), transport);

        let err = source.test_connection().await.unwrap_err();
        assert!(matches!(err, SourceError::Historian(e) if e.is_timeout()));
    }

    #[tokio::test]
    async fn test_execute_passes_options() {
        let transport = Arc::new(MockTransport::always(json!([])));
        let source = HistorianSource::with_transport(config(Some("T1")), transport.clone());

        let result = source
            .execute(
                "SELECT * FROM Point",
                QueryOptions {
                    interval: Some(Interval::OneHour),
                    dual: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(result.metadata.tag, "T1");
        assert_eq!(transport.call_count(), 1);

        let err = source
            .execute("SELECT * FROM Point", QueryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Historian(HistorianError::Parse(_))));
    }
}
