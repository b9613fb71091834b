//! Core data types for historian queries
//!
//! - `Interval`: sampling granularity requested from the historian
//! - `TimeMarker` / `TimeWindow`: the resolved read window for one leg
//! - `Sample`: a single normalized reading
//! - `RawQuery` / `QueryOptions`: what a caller hands to the engine
//! - `ExecutionResult`: ordered samples plus execution metadata

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::historian::error::HistorianError;

/// Sampling granularity understood by the historian read endpoint.
///
/// Variants are declared finest-first, so the derived ordering is
/// granularity order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Interval {
    /// Reserved for the instant leg
    #[serde(rename = "1s")]
    OneSecond,
    #[serde(rename = "30s")]
    ThirtySeconds,
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "2h")]
    TwoHours,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[serde(rename = "1d")]
    OneDay,
}

impl Interval {
    /// Granularities a caller may request, finest first
    pub const SELECTABLE: [Interval; 10] = [
        Interval::ThirtySeconds,
        Interval::OneMinute,
        Interval::FiveMinutes,
        Interval::FifteenMinutes,
        Interval::ThirtyMinutes,
        Interval::OneHour,
        Interval::TwoHours,
        Interval::SixHours,
        Interval::TwelveHours,
        Interval::OneDay,
    ];

    /// Wire representation (`30s`, `1m`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneSecond => "1s",
            Self::ThirtySeconds => "30s",
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1h",
            Self::TwoHours => "2h",
            Self::SixHours => "6h",
            Self::TwelveHours => "12h",
            Self::OneDay => "1d",
        }
    }

    /// Length of one sampling step in seconds
    pub fn seconds(&self) -> i64 {
        match self {
            Self::OneSecond => 1,
            Self::ThirtySeconds => 30,
            Self::OneMinute => 60,
            Self::FiveMinutes => 5 * 60,
            Self::FifteenMinutes => 15 * 60,
            Self::ThirtyMinutes => 30 * 60,
            Self::OneHour => 3600,
            Self::TwoHours => 2 * 3600,
            Self::SixHours => 6 * 3600,
            Self::TwelveHours => 12 * 3600,
            Self::OneDay => 24 * 3600,
        }
    }

    /// Pick the granularity for a window of the given length
    ///
    /// | window       | interval |
    /// |--------------|----------|
    /// | <= 15 min    | 30s      |
    /// | <= 1 hour    | 1m       |
    /// | <= 6 hours   | 5m       |
    /// | <= 24 hours  | 15m      |
    /// | <= 1 week    | 1h       |
    /// | <= 1 month   | 6h       |
    /// | longer       | 1d       |
    pub fn for_duration(duration: Duration) -> Self {
        let secs = duration.num_seconds();
        if secs <= 15 * 60 {
            Self::ThirtySeconds
        } else if secs <= 3600 {
            Self::OneMinute
        } else if secs <= 6 * 3600 {
            Self::FiveMinutes
        } else if secs <= 24 * 3600 {
            Self::FifteenMinutes
        } else if secs <= 7 * 24 * 3600 {
            Self::OneHour
        } else if secs <= 30 * 24 * 3600 {
            Self::SixHours
        } else {
            Self::OneDay
        }
    }

    /// Lookback used when only an interval is known
    pub fn default_lookback(&self) -> Duration {
        match self {
            Self::OneSecond => Duration::minutes(5),
            Self::ThirtySeconds => Duration::minutes(15),
            Self::OneMinute => Duration::hours(1),
            Self::FiveMinutes => Duration::hours(6),
            Self::FifteenMinutes | Self::ThirtyMinutes | Self::OneHour => Duration::hours(24),
            Self::TwoHours | Self::SixHours | Self::TwelveHours => Duration::days(7),
            Self::OneDay => Duration::days(30),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = HistorianError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        std::iter::once(Interval::OneSecond)
            .chain(Interval::SELECTABLE)
            .find(|interval| interval.as_str() == wanted)
            .ok_or_else(|| {
                HistorianError::Parse(format!(
                    "unknown interval '{}', expected one of: {}",
                    s.trim(),
                    Interval::SELECTABLE
                        .iter()
                        .map(|i| i.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}

/// Unit of a relative time marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    /// Suffix used in `*-<n><unit>` markers
    pub fn suffix(&self) -> char {
        match self {
            Self::Second => 's',
            Self::Minute => 'm',
            Self::Hour => 'h',
            Self::Day => 'd',
        }
    }

    pub fn from_suffix(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            's' => Some(Self::Second),
            'm' => Some(Self::Minute),
            'h' => Some(Self::Hour),
            'd' => Some(Self::Day),
            _ => None,
        }
    }

    pub fn seconds(&self) -> i64 {
        match self {
            Self::Second => 1,
            Self::Minute => 60,
            Self::Hour => 3600,
            Self::Day => 24 * 3600,
        }
    }
}

/// Longest lookback any planned window reaches back
pub const MAX_LOOKBACK_DAYS: i64 = 3650;

/// `count` steps of `step_secs` seconds, saturating at [`MAX_LOOKBACK_DAYS`]
pub fn bounded_lookback(count: i64, step_secs: i64) -> Duration {
    let ceiling = Duration::days(MAX_LOOKBACK_DAYS);
    count
        .checked_mul(step_secs)
        .and_then(Duration::try_seconds)
        .map_or(ceiling, |lookback| lookback.clamp(Duration::zero(), ceiling))
}

/// A start or end marker in the historian's time alphabet
///
/// - `*` is now
/// - `*-<n><unit>` is a relative offset from now
/// - anything else is passed through as an absolute timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeMarker {
    Now,
    Ago { amount: i64, unit: TimeUnit },
    Absolute(String),
}

impl TimeMarker {
    /// Relative marker for a lookback, using the coarsest exact unit
    pub fn ago(duration: Duration) -> Self {
        let secs = duration.num_seconds().max(0);
        for unit in [TimeUnit::Day, TimeUnit::Hour, TimeUnit::Minute] {
            if secs > 0 && secs % unit.seconds() == 0 {
                return Self::Ago {
                    amount: secs / unit.seconds(),
                    unit,
                };
            }
        }
        Self::Ago {
            amount: secs,
            unit: TimeUnit::Second,
        }
    }

    /// Parse a marker from its wire form
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == "*" {
            return Self::Now;
        }

        if let Some(offset) = raw.strip_prefix("*-") {
            let mut chars = offset.chars();
            if let Some(unit) = chars.next_back().and_then(TimeUnit::from_suffix) {
                if let Ok(amount) = chars.as_str().parse::<i64>() {
                    return Self::Ago { amount, unit };
                }
            }
        }

        Self::Absolute(raw.to_string())
    }

    /// Resolve to a concrete instant; `None` for unparseable absolute
    /// markers and offsets beyond the calendar
    pub fn resolve(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Now => Some(now),
            Self::Ago { amount, unit } => amount
                .checked_mul(unit.seconds())
                .and_then(Duration::try_seconds)
                .and_then(|offset| now.checked_sub_signed(offset)),
            Self::Absolute(raw) => parse_timestamp(raw),
        }
    }

    pub fn is_now(&self) -> bool {
        matches!(self, Self::Now)
    }
}

impl fmt::Display for TimeMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Now => write!(f, "*"),
            Self::Ago { amount, unit } => write!(f, "*-{}{}", amount, unit.suffix()),
            Self::Absolute(raw) => f.write_str(raw),
        }
    }
}

impl Serialize for TimeMarker {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Which planner rule produced a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanRule {
    ExplicitRange,
    IntervalWithLimit,
    IntervalLookback,
    TimestampBetween,
    TimestampFrom,
    TimestampUntil,
    LegacyDateSub,
    LimitEstimate,
    Default,
}

impl fmt::Display for PlanRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ExplicitRange => "explicit_range",
            Self::IntervalWithLimit => "interval_with_limit",
            Self::IntervalLookback => "interval_lookback",
            Self::TimestampBetween => "timestamp_between",
            Self::TimestampFrom => "timestamp_from",
            Self::TimestampUntil => "timestamp_until",
            Self::LegacyDateSub => "legacy_date_sub",
            Self::LimitEstimate => "limit_estimate",
            Self::Default => "default",
        };
        f.write_str(name)
    }
}

/// A resolved read window for one leg
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeWindow {
    pub start: TimeMarker,
    pub end: TimeMarker,
    pub interval: Interval,
    /// Planner rule that resolved this window
    pub rule: PlanRule,
}

impl TimeWindow {
    /// Whether a sample timestamp falls inside the window.
    ///
    /// An end marker of `*` is open-ended (the historian's clock decides
    /// what "now" is). Timestamps that cannot be parsed are treated as
    /// opaque and kept.
    pub fn contains(&self, timestamp: &str, now: DateTime<Utc>) -> bool {
        let Some(ts) = parse_timestamp(timestamp) else {
            return true;
        };

        if let Some(start) = self.start.resolve(now) {
            if ts < start {
                return false;
            }
        }

        if !self.end.is_now() {
            if let Some(end) = self.end.resolve(now) {
                if ts > end {
                    return false;
                }
            }
        }

        true
    }
}

/// Parse a provider or caller timestamp (RFC 3339, ISO 8601 without zone, or a date)
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    // Zone-less timestamps are taken as UTC
    for format in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Shift an absolute timestamp, keeping its zone style
pub fn shift_timestamp(raw: &str, delta: Duration) -> Option<String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw.trim()) {
        return dt
            .checked_add_signed(delta)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::AutoSi, true));
    }
    parse_timestamp(raw)
        .and_then(|dt| dt.checked_add_signed(delta))
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
}

/// Compare two timestamps as instants when both parse, as strings otherwise
pub fn compare_timestamps(a: &str, b: &str) -> Ordering {
    match (parse_timestamp(a), parse_timestamp(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// Total sort key: parseable timestamps order after opaque ones, then by instant, then text
pub fn timestamp_sort_key(raw: &str) -> (bool, Option<DateTime<Utc>>, String) {
    let parsed = parse_timestamp(raw);
    (parsed.is_some(), parsed, raw.to_string())
}

/// Execution leg that produced a request or sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Leg {
    /// Latest-value read
    Instant,
    /// Ranged, interval-sampled read
    Historical,
    /// Caller-supplied URL fetched verbatim
    Direct,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instant => write!(f, "instant"),
            Self::Historical => write!(f, "historical"),
            Self::Direct => write!(f, "direct"),
        }
    }
}

/// A sample value: numeric when the provider value parses cleanly, raw otherwise
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SampleValue {
    Number(f64),
    Raw(serde_json::Value),
}

impl SampleValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Raw(_) => None,
        }
    }
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Raw(serde_json::Value::String(s)) => f.write_str(s),
            Self::Raw(other) => write!(f, "{}", other),
        }
    }
}

/// One normalized reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    /// 1-based position in the final ordering
    pub id: usize,
    pub tag: String,
    /// Provider-native timestamp string
    pub timestamp: String,
    pub value: SampleValue,
}

impl Sample {
    pub fn new(tag: impl Into<String>, timestamp: impl Into<String>, value: SampleValue) -> Self {
        Self {
            id: 0,
            tag: tag.into(),
            timestamp: timestamp.into(),
            value,
        }
    }
}

/// Caller-supplied execution parameters
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueryOptions {
    /// Tag to use when the query names none
    #[serde(default)]
    pub tag: Option<String>,
    /// Requested record count
    #[serde(default)]
    pub limit: Option<usize>,
    /// Requested sampling granularity
    #[serde(default)]
    pub interval: Option<Interval>,
    /// Force dual (true) or historical-only (false) execution
    #[serde(default)]
    pub dual: Option<bool>,
}

/// Query text plus execution parameters, built per caller invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RawQuery {
    pub text: String,
    pub options: QueryOptions,
}

impl RawQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            options: QueryOptions::default(),
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.options.tag = Some(tag.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.options.limit = Some(limit);
        self
    }

    pub fn interval(mut self, interval: Interval) -> Self {
        self.options.interval = Some(interval);
        self
    }

    pub fn dual(mut self, dual: bool) -> Self {
        self.options.dual = Some(dual);
        self
    }
}

/// How a query was executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    /// One leg only (presets, direct URLs, dual mode disabled)
    Single,
    /// Instant and historical legs merged
    Dual,
    /// Instant leg failed; historical leg only
    Fallback,
}

/// Per-leg request and outcome details
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegDiagnostics {
    pub leg: Leg,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<Interval>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<PlanRule>,
    pub elapsed_ms: u64,
    /// Rows in the provider payload, before sentinel filtering
    pub rows_received: usize,
    /// Samples left after normalization, window and predicate filtering
    pub samples_kept: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Execution metadata returned alongside the samples
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionMetadata {
    pub query_type: QueryType,
    pub is_fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    pub tag: String,
    /// Instant-leg samples before truncation
    pub real_time_count: usize,
    /// Historical-leg samples before truncation
    pub historical_count: usize,
    /// Samples in the final result
    pub total_count: usize,
    pub requested_limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instant: Option<LegDiagnostics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub historical: Option<LegDiagnostics>,
    pub execution_time_ms: u64,
}

/// Ordered samples plus metadata, returned to the caller and not retained
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub execution_id: Uuid,
    pub samples: Vec<Sample>,
    pub metadata: ExecutionMetadata,
}

impl ExecutionResult {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Most recent sample, if any
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.first()
    }
}
