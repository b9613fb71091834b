//! Time Window Planner
//!
//! Resolves `{interval, start, end}` for a leg from explicit caller
//! parameters, parsed predicates and defaults. Resolution walks an ordered
//! rule table and the first rule that produces a window wins:
//!
//! 1. explicit time range
//! 2. explicit interval with a known limit (`limit x interval`, ending now)
//! 3. explicit interval alone (per-interval lookback table)
//! 4. `timestamp BETWEEN a AND b` (or both `>=` and `<=` bounds)
//! 5. `timestamp >= a` (until now)
//! 6. `timestamp <= b` (one hour before `b`)
//! 7. legacy `DATE_SUB(NOW(), INTERVAL n UNIT)`
//! 8. parsed LIMIT/TOP alone (about one sample per minute)
//! 9. default: the last hour
//!
//! Planning is pure and never fails. Lookbacks derived from limits or
//! legacy amounts saturate at [`MAX_LOOKBACK_DAYS`].

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::historian::ast::ParsedQuery;
use crate::historian::types::{
    bounded_lookback, shift_timestamp, Interval, PlanRule, TimeMarker, TimeWindow,
    MAX_LOOKBACK_DAYS,
};

/// Inputs to a single planning pass
#[derive(Debug, Clone)]
pub struct PlanRequest<'a> {
    pub parsed: Option<&'a ParsedQuery>,
    pub interval: Option<Interval>,
    pub time_range: Option<(TimeMarker, TimeMarker)>,
    /// Known record limit (parsed or caller-supplied)
    pub limit: Option<usize>,
    pub now: DateTime<Utc>,
}

impl<'a> PlanRequest<'a> {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            parsed: None,
            interval: None,
            time_range: None,
            limit: None,
            now,
        }
    }

    pub fn parsed(mut self, parsed: &'a ParsedQuery) -> Self {
        self.parsed = Some(parsed);
        self
    }

    pub fn interval(mut self, interval: Option<Interval>) -> Self {
        self.interval = interval;
        self
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn time_range(mut self, start: TimeMarker, end: TimeMarker) -> Self {
        self.time_range = Some((start, end));
        self
    }
}

/// One entry of the priority table
pub struct Rule {
    pub kind: PlanRule,
    pub resolve: fn(&PlanRequest<'_>) -> Option<TimeWindow>,
}

/// Rules in priority order
pub const RULES: [Rule; 8] = [
    Rule {
        kind: PlanRule::ExplicitRange,
        resolve: explicit_range,
    },
    Rule {
        kind: PlanRule::IntervalWithLimit,
        resolve: interval_with_limit,
    },
    Rule {
        kind: PlanRule::IntervalLookback,
        resolve: interval_lookback,
    },
    Rule {
        kind: PlanRule::TimestampBetween,
        resolve: timestamp_between,
    },
    Rule {
        kind: PlanRule::TimestampFrom,
        resolve: timestamp_from,
    },
    Rule {
        kind: PlanRule::TimestampUntil,
        resolve: timestamp_until,
    },
    Rule {
        kind: PlanRule::LegacyDateSub,
        resolve: legacy_date_sub,
    },
    Rule {
        kind: PlanRule::LimitEstimate,
        resolve: limit_estimate,
    },
];

/// Resolve the window for a leg
pub fn plan(request: &PlanRequest<'_>) -> TimeWindow {
    let window = RULES
        .iter()
        .find_map(|rule| (rule.resolve)(request))
        .unwrap_or_else(default_window);

    debug!(
        rule = %window.rule,
        interval = %window.interval,
        start = %window.start,
        end = %window.end,
        "Planned time window"
    );

    window
}

/// Narrow recent window used by the instant leg, planned as an explicit range
pub fn instant_window() -> TimeWindow {
    plan(
        &PlanRequest::new(Utc::now())
            .time_range(TimeMarker::ago(Duration::hours(1)), TimeMarker::Now)
            .interval(Some(Interval::OneSecond)),
    )
}

fn explicit_range(request: &PlanRequest<'_>) -> Option<TimeWindow> {
    let (start, end) = request.time_range.clone()?;
    let interval = request.interval.unwrap_or_else(|| {
        let span = match (start.resolve(request.now), end.resolve(request.now)) {
            (Some(s), Some(e)) => e - s,
            _ => Duration::hours(1),
        };
        Interval::for_duration(span)
    });

    Some(TimeWindow {
        start,
        end,
        interval,
        rule: PlanRule::ExplicitRange,
    })
}

fn interval_with_limit(request: &PlanRequest<'_>) -> Option<TimeWindow> {
    let interval = request.interval?;
    let limit = i64::try_from(request.limit?.max(1)).unwrap_or(i64::MAX);

    Some(TimeWindow {
        start: TimeMarker::ago(bounded_lookback(limit, interval.seconds())),
        end: TimeMarker::Now,
        interval,
        rule: PlanRule::IntervalWithLimit,
    })
}

fn interval_lookback(request: &PlanRequest<'_>) -> Option<TimeWindow> {
    let interval = request.interval?;

    Some(TimeWindow {
        start: TimeMarker::ago(interval.default_lookback()),
        end: TimeMarker::Now,
        interval,
        rule: PlanRule::IntervalLookback,
    })
}

fn timestamp_between(request: &PlanRequest<'_>) -> Option<TimeWindow> {
    let conditions = &request.parsed?.where_conditions;
    let (start, end) = match (
        &conditions.timestamp_between,
        &conditions.timestamp_gte,
        &conditions.timestamp_lte,
    ) {
        (Some(range), _, _) => (range.start.clone(), range.end.clone()),
        (None, Some(gte), Some(lte)) => (gte.clone(), lte.clone()),
        _ => return None,
    };

    let start = TimeMarker::Absolute(start);
    let end = TimeMarker::Absolute(end);
    let interval = heuristic_for(&start, &end, request.now);

    Some(TimeWindow {
        start,
        end,
        interval,
        rule: PlanRule::TimestampBetween,
    })
}

fn timestamp_from(request: &PlanRequest<'_>) -> Option<TimeWindow> {
    let gte = request.parsed?.where_conditions.timestamp_gte.as_ref()?;
    let start = TimeMarker::Absolute(gte.clone());
    let interval = heuristic_for(&start, &TimeMarker::Now, request.now);

    Some(TimeWindow {
        start,
        end: TimeMarker::Now,
        interval,
        rule: PlanRule::TimestampFrom,
    })
}

fn timestamp_until(request: &PlanRequest<'_>) -> Option<TimeWindow> {
    let lte = request.parsed?.where_conditions.timestamp_lte.as_ref()?;
    let start = shift_timestamp(lte, -Duration::hours(1))
        .map(TimeMarker::Absolute)
        .unwrap_or_else(|| TimeMarker::ago(Duration::hours(1)));

    Some(TimeWindow {
        start,
        end: TimeMarker::Absolute(lte.clone()),
        interval: Interval::for_duration(Duration::hours(1)),
        rule: PlanRule::TimestampUntil,
    })
}

fn legacy_date_sub(request: &PlanRequest<'_>) -> Option<TimeWindow> {
    let range = request.parsed?.legacy_range?;
    let lookback = range.duration();
    let start = if range.is_saturated() {
        TimeMarker::ago(lookback)
    } else {
        TimeMarker::Ago {
            amount: range.amount,
            unit: range.unit,
        }
    };

    Some(TimeWindow {
        start,
        end: TimeMarker::Now,
        interval: Interval::for_duration(lookback),
        rule: PlanRule::LegacyDateSub,
    })
}

fn limit_estimate(request: &PlanRequest<'_>) -> Option<TimeWindow> {
    let limit = request.parsed?.limit?;
    // Assume roughly one sample per minute, with 20% headroom
    let minutes = ((limit as f64 * 1.2).ceil() as i64).max(5);
    let lookback = bounded_lookback(minutes, 60);

    Some(TimeWindow {
        start: TimeMarker::ago(lookback),
        end: TimeMarker::Now,
        interval: Interval::for_duration(lookback),
        rule: PlanRule::LimitEstimate,
    })
}

fn default_window() -> TimeWindow {
    let lookback = Duration::hours(1);
    TimeWindow {
        start: TimeMarker::ago(lookback),
        end: TimeMarker::Now,
        interval: Interval::for_duration(lookback),
        rule: PlanRule::Default,
    }
}

fn heuristic_for(start: &TimeMarker, end: &TimeMarker, now: DateTime<Utc>) -> Interval {
    let span = match (start.resolve(now), end.resolve(now)) {
        (Some(s), Some(e)) => e - s,
        _ => Duration::hours(1),
    };
    Interval::for_duration(span)
}
