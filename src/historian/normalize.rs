//! Response normalization and merging
//!
//! Flattens the historian's response envelopes into [`Sample`]s, drops
//! sentinel rows, applies WHERE predicates and produces the final
//! newest-first, re-indexed sequence.
//!
//! Accepted envelopes, each carrying `{v0: timestamp, v1: value}` rows:
//!
//! ```text
//! [ {"v0": ..., "v1": ...}, ... ]
//! [ {"data": [ {"v0": ..., "v1": ...}, ... ]} ]
//! { "data": [ {"v0": ..., "v1": ...}, ... ] }
//! ```

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cmp::Reverse;

use crate::historian::ast::WhereConditions;
use crate::historian::error::TransportError;
use crate::historian::types::{timestamp_sort_key, Sample, SampleValue, TimeWindow};

/// Provider marker for an absent sample
const NO_DATA: &str = "no data";

/// Samples extracted from one payload
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// Rows in the envelope, before sentinel filtering
    pub rows_received: usize,
    pub samples: Vec<Sample>,
}

/// Flatten a provider payload into samples for `tag`
pub fn normalize(payload: &Value, tag: &str) -> Result<Normalized, TransportError> {
    let rows = extract_rows(payload).ok_or_else(|| {
        TransportError::InvalidPayload(format!(
            "expected a row array or a `data` envelope, got {}",
            describe(payload)
        ))
    })?;

    let samples = rows.iter().filter_map(|row| to_sample(row, tag)).collect();

    Ok(Normalized {
        rows_received: rows.len(),
        samples,
    })
}

fn extract_rows(payload: &Value) -> Option<&Vec<Value>> {
    match payload {
        Value::Array(items) => match items.first().and_then(|first| first.get("data")) {
            Some(Value::Array(data)) => Some(data),
            _ => Some(items),
        },
        Value::Object(map) => map.get("data").and_then(Value::as_array),
        _ => None,
    }
}

fn describe(payload: &Value) -> &'static str {
    match payload {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object without `data`",
    }
}

fn to_sample(row: &Value, tag: &str) -> Option<Sample> {
    let raw = row.get("v1")?;
    if is_sentinel(raw) {
        return None;
    }

    let timestamp = match row.get("v0")? {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    Some(Sample::new(tag, timestamp, parse_value(raw)))
}

/// `null` and "No Data" mark absent samples
pub fn is_sentinel(raw: &Value) -> bool {
    match raw {
        Value::Null => true,
        Value::String(s) => s.trim().eq_ignore_ascii_case(NO_DATA),
        _ => false,
    }
}

/// Numeric when the raw value parses cleanly as a finite float, verbatim otherwise
pub fn parse_value(raw: &Value) -> SampleValue {
    match raw {
        Value::Number(n) => n
            .as_f64()
            .map(SampleValue::Number)
            .unwrap_or_else(|| SampleValue::Raw(raw.clone())),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => SampleValue::Number(v),
            _ => SampleValue::Raw(raw.clone()),
        },
        other => SampleValue::Raw(other.clone()),
    }
}

/// Keep samples that satisfy the WHERE predicates
pub fn apply_predicates(samples: &mut Vec<Sample>, conditions: &WhereConditions) {
    if !conditions.is_empty() {
        samples.retain(|sample| conditions.matches(sample));
    }
}

/// Keep samples whose timestamp falls inside the leg's window
pub fn retain_within(samples: &mut Vec<Sample>, window: &TimeWindow, now: DateTime<Utc>) {
    samples.retain(|sample| window.contains(&sample.timestamp, now));
}

/// Stable sort, newest first
pub fn sort_descending(samples: &mut [Sample]) {
    samples.sort_by_cached_key(|sample| Reverse(timestamp_sort_key(&sample.timestamp)));
}

/// Assign ids 1..N in current order
pub fn reindex(samples: &mut [Sample]) {
    for (index, sample) in samples.iter_mut().enumerate() {
        sample.id = index + 1;
    }
}

/// Sort, trim to `limit` and re-index a single leg
pub fn limit_and_reindex(mut samples: Vec<Sample>, limit: Option<usize>) -> Vec<Sample> {
    sort_descending(&mut samples);
    if let Some(limit) = limit {
        samples.truncate(limit);
    }
    reindex(&mut samples);
    samples
}

/// Merge both legs: concatenate instant then historical, sort newest first
/// (ties keep concatenation order), trim to `limit`, re-index.
pub fn merge(instant: Vec<Sample>, historical: Vec<Sample>, limit: Option<usize>) -> Vec<Sample> {
    let mut combined = instant;
    combined.extend(historical);
    limit_and_reindex(combined, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::historian::types::{Interval, PlanRule, TimeMarker};
    use chrono::TimeZone;
    use serde_json::json;

    fn number(tag: &str, ts: &str, v: f64) -> Sample {
        Sample::new(tag, ts, SampleValue::Number(v))
    }

    #[test]
    fn test_merge_is_deterministic() {
        let instant = vec![number("T1", "2025-01-01T10:00:00", 1.0)];
        let historical = vec![
            number("T1", "2025-01-01T09:00:00", 2.0),
            number("T1", "2025-01-01T09:30:00", 3.0),
        ];

        let merged = merge(instant, historical, Some(3));

        let view: Vec<(usize, &str, f64)> = merged
            .iter()
            .map(|s| (s.id, s.timestamp.as_str(), s.value.as_f64().unwrap()))
            .collect();
        assert_eq!(
            view,
            vec![
                (1, "2025-01-01T10:00:00", 1.0),
                (2, "2025-01-01T09:30:00", 3.0),
                (3, "2025-01-01T09:00:00", 2.0),
            ]
        );
    }

    #[test]
    fn test_merge_truncates_and_keeps_ties_stable() {
        let instant = vec![number("T1", "2025-01-01T10:00:00", 1.0)];
        let historical = vec![
            number("T1", "2025-01-01T10:00:00", 2.0),
            number("T1", "2025-01-01T08:00:00", 3.0),
        ];

        let merged = merge(instant, historical, Some(2));
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].value, SampleValue::Number(1.0));
        assert_eq!(merged[1].value, SampleValue::Number(2.0));
        assert_eq!(merged.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_merge_without_limit_keeps_everything() {
        let merged = merge(
            vec![],
            vec![
                number("T1", "2025-01-01T08:00:00", 1.0),
                number("T1", "2025-01-01T09:00:00", 2.0),
            ],
            None,
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].timestamp, "2025-01-01T09:00:00");
    }

    #[test]
    fn test_all_envelopes_drop_sentinels() {
        let rows = json!([
            {"v0": "2025-01-01T10:00:00", "v1": "12.5"},
            {"v0": "2025-01-01T10:01:00", "v1": null},
            {"v0": "2025-01-01T10:02:00", "v1": "No Data"},
            {"v0": "2025-01-01T10:03:00"},
            {"v0": "2025-01-01T10:04:00", "v1": " no data "},
            {"v0": "2025-01-01T10:05:00", "v1": 7}
        ]);
        let envelopes = [
            rows.clone(),
            json!([{ "data": rows.clone() }]),
            json!({ "data": rows.clone() }),
        ];

        for envelope in envelopes.iter() {
            let normalized = normalize(envelope, "T1").unwrap();
            assert_eq!(normalized.rows_received, 6);
            assert_eq!(normalized.samples.len(), 2, "envelope {}", envelope);
            assert!(normalized.samples.iter().all(|s| !matches!(
                &s.value,
                SampleValue::Raw(v) if is_sentinel(v)
            )));
            assert_eq!(normalized.samples[0].value, SampleValue::Number(12.5));
            assert_eq!(normalized.samples[1].value, SampleValue::Number(7.0));
        }
    }

    #[test]
    fn test_non_numeric_values_are_kept() {
        let payload = json!([
            {"v0": "2025-01-01T10:00:00", "v1": "Bad Input"},
            {"v0": "2025-01-01T10:01:00", "v1": true},
            {"v0": "2025-01-01T10:02:00", "v1": " 42 "}
        ]);
        let normalized = normalize(&payload, "T1").unwrap();
        assert_eq!(normalized.samples.len(), 3);
        assert_eq!(normalized.samples[0].value, SampleValue::Raw(json!("Bad Input")));
        assert_eq!(normalized.samples[1].value, SampleValue::Raw(json!(true)));
        assert_eq!(normalized.samples[2].value, SampleValue::Number(42.0));
        assert!(normalized.samples.iter().all(|s| s.tag == "T1"));
    }

    #[test]
    fn test_unrecognised_envelope() {
        assert!(matches!(
            normalize(&json!({"items": []}), "T1"),
            Err(TransportError::InvalidPayload(_))
        ));
        assert!(normalize(&json!("oops"), "T1").is_err());
        assert_eq!(normalize(&json!([]), "T1").unwrap().samples.len(), 0);
    }

    #[test]
    fn test_retain_within_window() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let window = TimeWindow {
            start: TimeMarker::parse("*-1h"),
            end: TimeMarker::Now,
            interval: Interval::OneMinute,
            rule: PlanRule::Default,
        };
        let mut samples = vec![
            number("T1", "2025-01-01T11:30:00", 1.0),
            number("T1", "2025-01-01T10:30:00", 2.0),
        ];
        retain_within(&mut samples, &window, now);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].timestamp, "2025-01-01T11:30:00");
    }

    #[test]
    fn test_limit_and_reindex() {
        let samples = (0..10)
            .map(|i| number("T1", &format!("2025-01-01T10:{:02}:00", i), i as f64))
            .collect();
        let limited = limit_and_reindex(samples, Some(4));
        assert_eq!(limited.len(), 4);
        assert_eq!(limited[0].timestamp, "2025-01-01T10:09:00");
        assert_eq!(limited.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }
}
