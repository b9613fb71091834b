//! Data Transfer Objects
//!
//! Request and response types for the API endpoints. Query results are
//! returned as [`ExecutionResult`](crate::historian::ExecutionResult)
//! directly.

use serde::{Deserialize, Serialize};

use crate::historian::QueryOptions;

// ============================================
// QUERY DTOs
// ============================================

/// Query request from the trigger layer
///
/// ```json
/// {"query": "SELECT * FROM Point WHERE tag = 'T1'", "interval": "1m", "limit": 10}
/// ```
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    /// Query text, preset keyword or historian URL
    pub query: String,
    /// Tag, limit, interval and dual-mode override
    #[serde(flatten)]
    pub options: QueryOptions,
}

// ============================================
// SOURCE DTOs
// ============================================

/// Source listing
#[derive(Debug, Serialize)]
pub struct SourcesResponse {
    /// Kind of the source this server executes against
    pub active: String,
    pub description: String,
    /// Every registered kind
    pub kinds: Vec<String>,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Full health status response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy or degraded
    pub status: String,
    /// Active source kind
    pub source: String,
    /// Connection test outcome: ok or error
    pub source_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::historian::Interval;

    #[test]
    fn test_query_request_flattens_options() {
        let request: QueryRequest = serde_json::from_str(
            r#"{"query": "latest", "tag": "T1", "limit": 5, "interval": "15m", "dual": false}"#,
        )
        .unwrap();
        assert_eq!(request.query, "latest");
        assert_eq!(request.options.tag.as_deref(), Some("T1"));
        assert_eq!(request.options.limit, Some(5));
        assert_eq!(request.options.interval, Some(Interval::FifteenMinutes));
        assert_eq!(request.options.dual, Some(false));

        let bare: QueryRequest = serde_json::from_str(r#"{"query": "history"}"#).unwrap();
        assert_eq!(bare.options, QueryOptions::default());
    }
}
