//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::config::ApiConfig;
use crate::sources::DataSource;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Data source queries are executed against
    pub source: Arc<dyn DataSource>,
    /// Kinds known to the registry the source was built from
    pub source_kinds: Vec<String>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(source: Arc<dyn DataSource>, source_kinds: Vec<String>, config: ApiConfig) -> Self {
        Self {
            source,
            source_kinds,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
