//! Historian HTTP transport
//!
//! The engine talks to the historian through [`HistorianTransport`] so that
//! tests can substitute a recording mock for the real reqwest client.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::historian::error::TransportError;

/// Longest upstream error body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// Read-only JSON GET against the historian
#[async_trait]
pub trait HistorianTransport: Send + Sync {
    /// Issue one GET for a fully rendered URL, bounded by `timeout`
    async fn get_json(&self, url: &str, timeout: Duration) -> Result<Value, TransportError>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(concat!("tagwire/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HistorianTransport for ReqwestTransport {
    async fn get_json(&self, url: &str, timeout: Duration) -> Result<Value, TransportError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_request_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: truncate(body),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| map_request_error(e, timeout))?;

        serde_json::from_str(&body)
            .map_err(|e| TransportError::InvalidPayload(format!("response is not JSON: {}", e)))
    }
}

fn map_request_error(e: reqwest::Error, timeout: Duration) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout {
            timeout_secs: timeout.as_secs(),
        }
    } else {
        TransportError::Network(e)
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
        body.push_str("...");
    }
    body
}

/// Render `base?k=v&...` with percent-encoded values
pub fn render_url(base: &str, params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return base.to_string();
    }

    let query = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", base, query)
}

/// Decoded value of a query parameter in a rendered URL
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    let query = query.split('#').next().unwrap_or_default();

    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key.eq_ignore_ascii_case(name) {
            urlencoding::decode(&value.replace('+', " "))
                .ok()
                .map(|v| v.into_owned())
        } else {
            None
        }
    })
}

#[cfg(test)]
pub(crate) mod mock {
    //! Recording transport for engine tests

    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub struct RecordedRequest {
        pub url: String,
        pub timeout: Duration,
    }

    impl RecordedRequest {
        pub fn param(&self, name: &str) -> Option<String> {
            query_param(&self.url, name)
        }

        /// Instant reads are the only ones sampled at 1s
        pub fn is_instant(&self) -> bool {
            self.param("interval").as_deref() == Some("1s")
        }
    }

    type Responder = dyn Fn(&RecordedRequest) -> Result<Value, TransportError> + Send + Sync;

    pub struct MockTransport {
        requests: Mutex<Vec<RecordedRequest>>,
        responder: Box<Responder>,
    }

    impl MockTransport {
        pub fn new(
            responder: impl Fn(&RecordedRequest) -> Result<Value, TransportError>
                + Send
                + Sync
                + 'static,
        ) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                responder: Box::new(responder),
            }
        }

        /// Answer every request with the same payload
        pub fn always(payload: Value) -> Self {
            Self::new(move |_| Ok(payload.clone()))
        }

        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HistorianTransport for MockTransport {
        async fn get_json(&self, url: &str, timeout: Duration) -> Result<Value, TransportError> {
            let request = RecordedRequest {
                url: url.to_string(),
                timeout,
            };
            self.requests.lock().unwrap().push(request.clone());
            (self.responder)(&request)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_url_encodes_values() {
        let url = render_url(
            "http://pi/pi/trn",
            &[
                ("tag", "Boiler Temp".to_string()),
                ("start", "*-1h".to_string()),
            ],
        );
        assert_eq!(url, "http://pi/pi/trn?tag=Boiler%20Temp&start=%2A-1h");
        assert_eq!(render_url("http://pi/pi/trn", &[]), "http://pi/pi/trn");
    }

    #[test]
    fn test_query_param_decodes() {
        let url = "http://pi/pi/trn?tag=Boiler%20Temp&start=%2A-1h&maxCount=1";
        assert_eq!(query_param(url, "tag").as_deref(), Some("Boiler Temp"));
        assert_eq!(query_param(url, "start").as_deref(), Some("*-1h"));
        assert_eq!(query_param(url, "TAG").as_deref(), Some("Boiler Temp"));
        assert_eq!(query_param(url, "missing"), None);
        assert_eq!(query_param("http://pi/pi/trn", "tag"), None);
    }

    #[test]
    fn test_truncate_error_body() {
        let body = "x".repeat(MAX_ERROR_BODY + 10);
        let truncated = truncate(body);
        assert_eq!(truncated.len(), MAX_ERROR_BODY + 3);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncate("short".to_string()), "short");
    }

    #[tokio::test]
    async fn test_mock_records_requests() {
        let transport = mock::MockTransport::always(serde_json::json!([]));
        transport
            .get_json("http://pi/pi/trn?interval=1s", Duration::from_secs(1))
            .await
            .unwrap();
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].is_instant());
    }
}
