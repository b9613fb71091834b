//! Stream Executor
//!
//! Turns a resolved window into exactly one GET per leg against the
//! historian read endpoint:
//!
//! ```text
//! GET {base_url}/pi/trn?tag=<tag>&interval=<i>&start=<marker>&end=<marker>[&maxCount=<n>]
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::historian::error::{TransportError, UpstreamError};
use crate::historian::normalize::normalize;
use crate::historian::transport::{query_param, render_url, HistorianTransport};
use crate::historian::types::{Leg, LegDiagnostics, Sample, TimeWindow};

/// Path of the read endpoint relative to the base URL
pub const READ_PATH: &str = "/pi/trn";

/// Result of one leg: diagnostics are always present, samples only on success
#[derive(Debug)]
pub struct LegOutcome {
    pub diagnostics: LegDiagnostics,
    pub result: Result<Vec<Sample>, UpstreamError>,
}

/// Issues instant, historical and direct reads
#[derive(Clone)]
pub struct StreamExecutor {
    transport: Arc<dyn HistorianTransport>,
    base_url: String,
    instant_timeout: Duration,
    historical_timeout: Duration,
}

impl StreamExecutor {
    pub fn new(
        transport: Arc<dyn HistorianTransport>,
        base_url: impl Into<String>,
        instant_timeout: Duration,
        historical_timeout: Duration,
    ) -> Self {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        Self {
            transport,
            base_url,
            instant_timeout,
            historical_timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of the read endpoint
    pub fn read_url(&self) -> String {
        format!("{}{}", self.base_url, READ_PATH)
    }

    /// Render the read request for a window
    pub fn request_url(&self, tag: &str, window: &TimeWindow, max_count: Option<usize>) -> String {
        let mut params = vec![
            ("tag", tag.to_string()),
            ("interval", window.interval.to_string()),
            ("start", window.start.to_string()),
            ("end", window.end.to_string()),
        ];
        if let Some(max_count) = max_count {
            params.push(("maxCount", max_count.to_string()));
        }
        render_url(&self.read_url(), &params)
    }

    /// Freshest known value: one sample from the instant window
    pub async fn fetch_instant(&self, tag: &str, window: &TimeWindow) -> LegOutcome {
        let url = self.request_url(tag, window, Some(1));
        let mut diagnostics = window_diagnostics(Leg::Instant, &url, window, Some(1));
        let result = self
            .run(Leg::Instant, url, tag, self.instant_timeout, &mut diagnostics)
            .await;
        LegOutcome {
            diagnostics,
            result,
        }
    }

    /// Ranged, interval-sampled read
    pub async fn fetch_historical(
        &self,
        tag: &str,
        window: &TimeWindow,
        max_count: Option<usize>,
    ) -> LegOutcome {
        let url = self.request_url(tag, window, max_count);
        let mut diagnostics = window_diagnostics(Leg::Historical, &url, window, max_count);
        let result = self
            .run(Leg::Historical, url, tag, self.historical_timeout, &mut diagnostics)
            .await;
        LegOutcome {
            diagnostics,
            result,
        }
    }

    /// Fetch a caller-supplied URL verbatim
    pub async fn fetch_url(&self, url: &str, tag: &str) -> LegOutcome {
        let mut diagnostics = LegDiagnostics {
            leg: Leg::Direct,
            url: url.to_string(),
            interval: query_param(url, "interval").and_then(|i| i.parse().ok()),
            start: query_param(url, "start"),
            end: query_param(url, "end"),
            max_count: query_param(url, "maxCount").and_then(|n| n.parse().ok()),
            rule: None,
            elapsed_ms: 0,
            rows_received: 0,
            samples_kept: 0,
            error: None,
        };
        let result = self
            .run(
                Leg::Direct,
                url.to_string(),
                tag,
                self.historical_timeout,
                &mut diagnostics,
            )
            .await;
        LegOutcome {
            diagnostics,
            result,
        }
    }

    async fn run(
        &self,
        leg: Leg,
        url: String,
        tag: &str,
        timeout: Duration,
        diagnostics: &mut LegDiagnostics,
    ) -> Result<Vec<Sample>, UpstreamError> {
        debug!(leg = %leg, url = %url, timeout_secs = timeout.as_secs(), "Dispatching historian read");

        let started = Instant::now();
        let outcome: Result<_, TransportError> = match self.transport.get_json(&url, timeout).await
        {
            Ok(payload) => normalize(&payload, tag),
            Err(e) => Err(e),
        };
        diagnostics.elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(normalized) => {
                diagnostics.rows_received = normalized.rows_received;
                diagnostics.samples_kept = normalized.samples.len();
                debug!(
                    leg = %leg,
                    rows = normalized.rows_received,
                    count = normalized.samples.len(),
                    elapsed_ms = diagnostics.elapsed_ms,
                    "Historian read complete"
                );
                Ok(normalized.samples)
            }
            Err(source) => {
                diagnostics.error = Some(source.to_string());
                Err(UpstreamError { leg, url, source })
            }
        }
    }
}

fn window_diagnostics(
    leg: Leg,
    url: &str,
    window: &TimeWindow,
    max_count: Option<usize>,
) -> LegDiagnostics {
    LegDiagnostics {
        leg,
        url: url.to_string(),
        interval: Some(window.interval),
        start: Some(window.start.to_string()),
        end: Some(window.end.to_string()),
        max_count,
        rule: Some(window.rule),
        elapsed_ms: 0,
        rows_received: 0,
        samples_kept: 0,
        error: None,
    }
}
