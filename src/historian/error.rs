//! Historian error types
//!
//! Defines all error conditions that can occur while translating and
//! executing a historian query.

use thiserror::Error;

use crate::historian::types::Leg;

/// Errors that can occur during historian query operations
#[derive(Error, Debug)]
pub enum HistorianError {
    /// Missing base URL, or no tag and no configured default
    #[error("Configuration error: {0}")]
    Config(String),

    /// Query text failed shape validation, or a required interval is absent
    #[error("Parse error: {0}")]
    Parse(String),

    /// A read against the historian failed
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),
}

impl HistorianError {
    /// Whether the failure came from a timed-out upstream read
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            HistorianError::Upstream(UpstreamError {
                source: TransportError::Timeout { .. },
                ..
            })
        )
    }
}

/// A failed read on one execution leg, with the transport cause preserved
#[derive(Error, Debug)]
#[error("{leg} read from {url} failed: {source}")]
pub struct UpstreamError {
    /// Leg that issued the request
    pub leg: Leg,
    /// Rendered request URL
    pub url: String,
    /// Underlying transport failure
    #[source]
    pub source: TransportError,
}

/// Errors raised by a [`HistorianTransport`](crate::historian::HistorianTransport)
#[derive(Error, Debug)]
pub enum TransportError {
    /// Historian answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection or protocol failure
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Request exceeded its per-leg timeout
    #[error("timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Body was not JSON, or not a recognised response envelope
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// Result type for historian operations
pub type HistorianResult<T> = Result<T, HistorianError>;
