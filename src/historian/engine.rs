//! Query Engine
//!
//! Sequences classification, parsing, planning, execution and merging for
//! one caller invocation.
//!
//! # Execution Pipeline
//!
//! ```text
//! RawQuery → Parsing → Planning → Executing ─┬→ Merging → Done
//!                                            └→ Fallback → Merging → Done
//! ```
//!
//! Declarative queries run two legs by default: an instant read for the
//! freshest value and a historical read over the planned window. If the
//! instant leg fails the engine falls back to the historical leg alone;
//! a historical failure is always fatal.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::HistorianConfig;
use crate::historian::ast::{ParsedQuery, WhereConditions};
use crate::historian::error::{HistorianError, HistorianResult};
use crate::historian::executor::{LegOutcome, StreamExecutor};
use crate::historian::input::{classify, Preset, QueryInput};
use crate::historian::normalize::{apply_predicates, limit_and_reindex, merge, retain_within};
use crate::historian::parser::parse_query;
use crate::historian::planner::{instant_window, plan, PlanRequest};
use crate::historian::transport::{query_param, HistorianTransport, ReqwestTransport};
use crate::historian::types::{
    ExecutionMetadata, ExecutionResult, LegDiagnostics, QueryType, RawQuery, Sample, TimeWindow,
};

/// Engine states, logged as execution progresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parsing,
    Planning,
    Executing,
    Fallback,
    Merging,
    Done,
}

/// Historian query engine. Holds no per-invocation state, so one engine
/// can serve concurrent callers.
#[derive(Clone)]
pub struct HistorianEngine {
    executor: StreamExecutor,
    default_tag: Option<String>,
    dual_mode: bool,
    retry_count: u32,
}

/// What the executing stage produced, before merging
struct Legs {
    query_type: QueryType,
    fallback_reason: Option<String>,
    instant: Vec<Sample>,
    historical: Vec<Sample>,
    instant_diagnostics: Option<LegDiagnostics>,
    historical_diagnostics: Option<LegDiagnostics>,
}

impl HistorianEngine {
    /// Create an engine over an explicit transport
    pub fn new(config: &HistorianConfig, transport: Arc<dyn HistorianTransport>) -> Self {
        let executor = StreamExecutor::new(
            transport,
            config.base_url.clone(),
            Duration::from_secs(config.instant_timeout_secs),
            Duration::from_secs(config.historical_timeout_secs),
        );

        debug!(
            base_url = %executor.base_url(),
            retry_count = config.retry_count,
            dual_mode = config.dual_mode,
            "Historian engine configured"
        );

        Self {
            executor,
            default_tag: config.default_tag().map(str::to_string),
            dual_mode: config.dual_mode,
            retry_count: config.retry_count,
        }
    }

    /// Create an engine backed by the reqwest transport
    pub fn from_config(config: &HistorianConfig) -> HistorianResult<Self> {
        let transport = ReqwestTransport::new().map_err(|e| {
            HistorianError::Config(format!("failed to build HTTP client: {}", e))
        })?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn default_tag(&self) -> Option<&str> {
        self.default_tag.as_deref()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Execute a raw query
    pub async fn execute(&self, query: &RawQuery) -> HistorianResult<ExecutionResult> {
        let started = Instant::now();
        let execution_id = Uuid::new_v4();
        let now = Utc::now();

        self.enter(execution_id, Stage::Parsing);
        let input = classify(&query.text)?;
        if self.executor.base_url().is_empty() {
            return Err(HistorianError::Config(
                "historian base URL is not configured".to_string(),
            ));
        }

        let (tag, limit, legs) = match input {
            QueryInput::Declarative(text) => {
                let parsed = parse_query(text)?;
                let tag = self.resolve_tag([parsed.tag.as_deref(), query.options.tag.as_deref()])?;
                // Declarative LIMIT/TOP wins over the caller's limit
                let limit = parsed.limit.or(query.options.limit);
                let legs = self
                    .run_declarative(execution_id, query, &parsed, &tag, limit, now)
                    .await?;
                (tag, limit, legs)
            }
            QueryInput::Preset(preset) => {
                let tag = self.resolve_tag([query.options.tag.as_deref()])?;
                let limit = query.options.limit;
                let legs = self
                    .run_preset(execution_id, query, preset, &tag, limit, now)
                    .await?;
                (tag, limit, legs)
            }
            QueryInput::DirectUrl(url) => {
                let url_tag = query_param(url, "tag");
                let tag =
                    self.resolve_tag([url_tag.as_deref(), query.options.tag.as_deref()])?;
                let limit = query.options.limit;
                let legs = self.run_direct(execution_id, url, &tag).await?;
                (tag, limit, legs)
            }
        };

        self.enter(execution_id, Stage::Merging);
        let real_time_count = legs.instant.len();
        let historical_count = legs.historical.len();
        let samples = merge(legs.instant, legs.historical, limit);

        let metadata = ExecutionMetadata {
            query_type: legs.query_type,
            is_fallback: legs.query_type == QueryType::Fallback,
            fallback_reason: legs.fallback_reason,
            tag,
            real_time_count,
            historical_count,
            total_count: samples.len(),
            requested_limit: limit,
            instant: legs.instant_diagnostics,
            historical: legs.historical_diagnostics,
            execution_time_ms: started.elapsed().as_millis() as u64,
        };

        self.enter(execution_id, Stage::Done);
        info!(
            execution_id = %execution_id,
            tag = %metadata.tag,
            query_type = ?metadata.query_type,
            count = metadata.total_count,
            elapsed_ms = metadata.execution_time_ms,
            "Historian query executed"
        );

        Ok(ExecutionResult {
            execution_id,
            samples,
            metadata,
        })
    }

    /// Read the freshest value for a tag (instant leg only)
    pub async fn read_latest(&self, tag: &str) -> HistorianResult<Option<Sample>> {
        if self.executor.base_url().is_empty() {
            return Err(HistorianError::Config(
                "historian base URL is not configured".to_string(),
            ));
        }

        let outcome = self.executor.fetch_instant(tag, &instant_window()).await;
        let samples = limit_and_reindex(outcome.result?, Some(1));
        Ok(samples.into_iter().next())
    }

    async fn run_declarative(
        &self,
        execution_id: Uuid,
        query: &RawQuery,
        parsed: &ParsedQuery,
        tag: &str,
        limit: Option<usize>,
        now: DateTime<Utc>,
    ) -> HistorianResult<Legs> {
        let interval = query.options.interval.ok_or_else(|| {
            HistorianError::Parse("an interval is required for declarative queries".to_string())
        })?;

        self.enter(execution_id, Stage::Planning);
        let historical_window = plan(
            &PlanRequest::new(now)
                .parsed(parsed)
                .interval(Some(interval))
                .limit(limit),
        );
        let conditions = &parsed.where_conditions;

        self.enter(execution_id, Stage::Executing);
        let dual = query.options.dual.unwrap_or(self.dual_mode);
        if !dual {
            let outcome = self
                .executor
                .fetch_historical(tag, &historical_window, limit)
                .await;
            let (historical, diagnostics) =
                finish_leg(outcome, &historical_window, Some(conditions), now)
                    .map_err(|(error, _)| error)?;
            return Ok(Legs {
                query_type: QueryType::Single,
                fallback_reason: None,
                instant: Vec::new(),
                historical,
                instant_diagnostics: None,
                historical_diagnostics: Some(diagnostics),
            });
        }

        let window = instant_window();
        let (instant_outcome, historical_outcome) = tokio::join!(
            self.executor.fetch_instant(tag, &window),
            self.executor.fetch_historical(tag, &historical_window, limit)
        );

        let (instant, instant_diagnostics, fallback_reason) =
            match finish_leg(instant_outcome, &window, Some(conditions), now) {
                Ok((samples, diagnostics)) => {
                    // Instant leg contributes at most its newest sample
                    (limit_and_reindex(samples, Some(1)), diagnostics, None)
                }
                Err((error, diagnostics)) => {
                    self.enter(execution_id, Stage::Fallback);
                    warn!(
                        execution_id = %execution_id,
                        tag = %tag,
                        error = %error,
                        "Instant read failed, continuing with historical data only"
                    );
                    (Vec::new(), diagnostics, Some(error.to_string()))
                }
            };

        let (historical, historical_diagnostics) =
            finish_leg(historical_outcome, &historical_window, Some(conditions), now)
                .map_err(|(error, _)| error)?;

        Ok(Legs {
            query_type: if fallback_reason.is_some() {
                QueryType::Fallback
            } else {
                QueryType::Dual
            },
            fallback_reason,
            instant,
            historical,
            instant_diagnostics: Some(instant_diagnostics),
            historical_diagnostics: Some(historical_diagnostics),
        })
    }

    async fn run_preset(
        &self,
        execution_id: Uuid,
        query: &RawQuery,
        preset: Preset,
        tag: &str,
        limit: Option<usize>,
        now: DateTime<Utc>,
    ) -> HistorianResult<Legs> {
        match preset {
            Preset::Latest => {
                self.enter(execution_id, Stage::Executing);
                let window = instant_window();
                let outcome = self.executor.fetch_instant(tag, &window).await;
                let (instant, diagnostics) =
                    finish_leg(outcome, &window, None, now).map_err(|(error, _)| error)?;
                Ok(Legs {
                    query_type: QueryType::Single,
                    fallback_reason: None,
                    instant: limit_and_reindex(instant, Some(1)),
                    historical: Vec::new(),
                    instant_diagnostics: Some(diagnostics),
                    historical_diagnostics: None,
                })
            }
            Preset::History => {
                let interval = query.options.interval.ok_or_else(|| {
                    HistorianError::Parse("an interval is required for history reads".to_string())
                })?;

                self.enter(execution_id, Stage::Planning);
                let window = plan(&PlanRequest::new(now).interval(Some(interval)).limit(limit));

                self.enter(execution_id, Stage::Executing);
                let outcome = self.executor.fetch_historical(tag, &window, limit).await;
                let (historical, diagnostics) =
                    finish_leg(outcome, &window, None, now).map_err(|(error, _)| error)?;
                Ok(Legs {
                    query_type: QueryType::Single,
                    fallback_reason: None,
                    instant: Vec::new(),
                    historical,
                    instant_diagnostics: None,
                    historical_diagnostics: Some(diagnostics),
                })
            }
        }
    }

    async fn run_direct(&self, execution_id: Uuid, url: &str, tag: &str) -> HistorianResult<Legs> {
        self.enter(execution_id, Stage::Executing);
        let outcome = self.executor.fetch_url(url, tag).await;
        let diagnostics = outcome.diagnostics;
        let historical = outcome.result?;

        Ok(Legs {
            query_type: QueryType::Single,
            fallback_reason: None,
            instant: Vec::new(),
            historical,
            instant_diagnostics: None,
            historical_diagnostics: Some(diagnostics),
        })
    }

    /// First non-blank candidate, then the configured default
    fn resolve_tag<const N: usize>(&self, candidates: [Option<&str>; N]) -> HistorianResult<String> {
        candidates
            .into_iter()
            .flatten()
            .chain(self.default_tag.as_deref())
            .map(str::trim)
            .find(|tag| !tag.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                HistorianError::Config("no tag given and no default tag configured".to_string())
            })
    }

    fn enter(&self, execution_id: Uuid, stage: Stage) {
        debug!(execution_id = %execution_id, stage = ?stage, "Engine stage");
    }
}

/// Apply window and predicate filtering to a finished leg
fn finish_leg(
    outcome: LegOutcome,
    window: &TimeWindow,
    conditions: Option<&WhereConditions>,
    now: DateTime<Utc>,
) -> Result<(Vec<Sample>, LegDiagnostics), (HistorianError, LegDiagnostics)> {
    let LegOutcome {
        mut diagnostics,
        result,
    } = outcome;

    match result {
        Ok(mut samples) => {
            retain_within(&mut samples, window, now);
            if let Some(conditions) = conditions {
                apply_predicates(&mut samples, conditions);
            }
            diagnostics.samples_kept = samples.len();
            Ok((samples, diagnostics))
        }
        Err(error) => Err((error.into(), diagnostics)),
    }
}
