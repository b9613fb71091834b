//! Parsed query representation
//!
//! The restricted query language targets one conceptual table of
//! `(tag, timestamp, value)` rows:
//!
//! ```text
//! SELECT TOP 5 * FROM Point WHERE tag = 'T1' AND value > 10 ORDER BY timestamp DESC
//! SELECT * FROM Point WHERE timestamp >= DATE_SUB(NOW(), INTERVAL 2 HOUR) LIMIT 20
//! ```

use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;

use crate::historian::types::{
    bounded_lookback, compare_timestamps, Sample, TimeUnit, MAX_LOOKBACK_DAYS,
};

/// A parsed declarative query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedQuery {
    /// Tag to read; `None` defers to the caller or configured default
    pub tag: Option<String>,
    /// Record count from `LIMIT n` or `SELECT TOP n` (LIMIT wins)
    pub limit: Option<usize>,
    /// Selected columns (`*` for all)
    pub columns: Vec<String>,
    /// Table named after FROM
    pub table: String,
    /// Informational only; results are always newest-first
    pub order_by: Option<OrderBy>,
    pub group_by: Vec<String>,
    pub where_conditions: WhereConditions,
    /// Older-style `DATE_SUB(NOW(), INTERVAL n UNIT)` lower bound
    pub legacy_range: Option<LegacyRange>,
}

impl ParsedQuery {
    /// Whether any timestamp predicate was given
    pub fn has_time_predicate(&self) -> bool {
        let w = &self.where_conditions;
        w.timestamp_between.is_some()
            || w.timestamp_gte.is_some()
            || w.timestamp_lte.is_some()
            || self.legacy_range.is_some()
    }
}

/// ORDER BY target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

/// `DATE_SUB(NOW(), INTERVAL <amount> <unit>)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyRange {
    pub amount: i64,
    pub unit: TimeUnit,
}

impl LegacyRange {
    /// Lookback length, saturating at the planner ceiling
    pub fn duration(&self) -> chrono::Duration {
        bounded_lookback(self.amount, self.unit.seconds())
    }

    /// Whether the amount reaches past the planner ceiling
    pub fn is_saturated(&self) -> bool {
        self.duration() >= chrono::Duration::days(MAX_LOOKBACK_DAYS)
    }
}

/// Inclusive timestamp range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampRange {
    pub start: String,
    pub end: String,
}

/// One-sided numeric bound on `value`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueBound {
    pub limit: f64,
    /// `>=` / `<=` rather than `>` / `<`
    pub inclusive: bool,
}

/// Inclusive numeric range on `value`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

/// A `tag LIKE '<pattern>'` predicate with its compiled matcher
#[derive(Debug, Clone)]
pub struct TagPattern {
    pub pattern: String,
    regex: Regex,
}

impl TagPattern {
    /// Compile a LIKE pattern; `%` is the only wildcard
    pub fn new(pattern: impl Into<String>) -> Result<Self, regex::Error> {
        let pattern = pattern.into();
        let body = pattern
            .split('%')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let regex = RegexBuilder::new(&format!("^{}$", body))
            .case_insensitive(true)
            .build()?;
        Ok(Self { pattern, regex })
    }

    pub fn is_match(&self, tag: &str) -> bool {
        self.regex.is_match(tag)
    }
}

impl PartialEq for TagPattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

/// Structured WHERE predicates. When a predicate appears more than once
/// the first occurrence is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereConditions {
    pub timestamp_gte: Option<String>,
    pub timestamp_lte: Option<String>,
    pub timestamp_between: Option<TimestampRange>,
    pub value_gt: Option<ValueBound>,
    pub value_lt: Option<ValueBound>,
    pub value_between: Option<ValueRange>,
    pub tag_eq: Option<String>,
    pub tag_in: Vec<String>,
    pub tag_like: Option<TagPattern>,
}

impl WhereConditions {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Sample-by-sample predicate test
    pub fn matches(&self, sample: &Sample) -> bool {
        self.matches_timestamp(&sample.timestamp)
            && self.matches_value(sample)
            && self.matches_tag(&sample.tag)
    }

    fn matches_timestamp(&self, ts: &str) -> bool {
        if let Some(gte) = &self.timestamp_gte {
            if compare_timestamps(ts, gte) == Ordering::Less {
                return false;
            }
        }
        if let Some(lte) = &self.timestamp_lte {
            if compare_timestamps(ts, lte) == Ordering::Greater {
                return false;
            }
        }
        if let Some(range) = &self.timestamp_between {
            if compare_timestamps(ts, &range.start) == Ordering::Less
                || compare_timestamps(ts, &range.end) == Ordering::Greater
            {
                return false;
            }
        }
        true
    }

    fn matches_value(&self, sample: &Sample) -> bool {
        let has_value_predicate =
            self.value_gt.is_some() || self.value_lt.is_some() || self.value_between.is_some();
        if !has_value_predicate {
            return true;
        }

        // Non-numeric values cannot satisfy a numeric predicate
        let Some(v) = sample.value.as_f64() else {
            return false;
        };

        if let Some(bound) = self.value_gt {
            if v < bound.limit || (v == bound.limit && !bound.inclusive) {
                return false;
            }
        }
        if let Some(bound) = self.value_lt {
            if v > bound.limit || (v == bound.limit && !bound.inclusive) {
                return false;
            }
        }
        if let Some(range) = self.value_between {
            if v < range.min || v > range.max {
                return false;
            }
        }
        true
    }

    fn matches_tag(&self, tag: &str) -> bool {
        if let Some(eq) = &self.tag_eq {
            if !eq.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if !self.tag_in.is_empty() && !self.tag_in.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            return false;
        }
        if let Some(pattern) = &self.tag_like {
            if !pattern.is_match(tag) {
                return false;
            }
        }
        true
    }
}
