//! End-to-end tests against an in-process fake historian
//!
//! The fake serves `/pi/trn` on an ephemeral port. Special tags script
//! failures:
//! - `BROKEN_INSTANT`: 500 on 1s (instant) reads
//! - `SLOW`: answers after 3 seconds
//! - `GARBAGE`: 200 with an HTML body

use axum::{
    body::Body,
    extract::{Query, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::util::ServiceExt;

use tagwire::api::{build_router, AppState};
use tagwire::config::{ApiConfig, HistorianConfig};
use tagwire::historian::{HistorianEngine, HistorianError, Interval, QueryType, RawQuery};
use tagwire::sources::{HistorianSource, SourceRegistry};

type RequestLog = Arc<Mutex<Vec<HashMap<String, String>>>>;

fn minutes_ago(minutes: i64) -> String {
    (Utc::now() - chrono::Duration::minutes(minutes))
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}

async fn read_endpoint(
    State(log): State<RequestLog>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    log.lock().unwrap().push(params.clone());

    let tag = params.get("tag").cloned().unwrap_or_default();
    let instant = params.get("interval").map(String::as_str) == Some("1s");

    match tag.as_str() {
        "BROKEN_INSTANT" if instant => {
            (StatusCode::INTERNAL_SERVER_ERROR, "instant store offline").into_response()
        }
        "SLOW" => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!([])).into_response()
        }
        "GARBAGE" => "<html>maintenance</html>".into_response(),
        _ if instant => Json(json!([{"v0": minutes_ago(0), "v1": 42.5}])).into_response(),
        _ => Json(json!({"data": [
            {"v0": minutes_ago(1), "v1": "10.5"},
            {"v0": minutes_ago(2), "v1": "No Data"},
            {"v0": minutes_ago(3), "v1": 9}
        ]}))
        .into_response(),
    }
}

/// Start the fake historian, returning its base URL and request log
async fn spawn_historian() -> (String, RequestLog) {
    let log: RequestLog = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/pi/trn", get(read_endpoint))
        .with_state(log.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), log)
}

fn config(base_url: &str) -> HistorianConfig {
    HistorianConfig {
        base_url: base_url.to_string(),
        instant_timeout_secs: 1,
        historical_timeout_secs: 1,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_dual_stream_over_http() {
    let (base_url, log) = spawn_historian().await;
    let engine = HistorianEngine::from_config(&config(&base_url)).unwrap();

    let result = engine
        .execute(
            &RawQuery::new("SELECT * FROM Point WHERE tag = 'Boiler Temp' LIMIT 10")
                .interval(Interval::OneMinute),
        )
        .await
        .unwrap();

    assert_eq!(result.metadata.query_type, QueryType::Dual);
    assert_eq!(result.metadata.real_time_count, 1);
    assert_eq!(result.metadata.historical_count, 2);
    let values: Vec<f64> = result
        .samples
        .iter()
        .map(|s| s.value.as_f64().unwrap())
        .collect();
    assert_eq!(values, vec![42.5, 10.5, 9.0]);
    assert_eq!(
        result.samples.iter().map(|s| s.id).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(result.samples.iter().all(|s| s.tag == "Boiler Temp"));

    let requests = log.lock().unwrap().clone();
    assert_eq!(requests.len(), 2);
    let historical = requests
        .iter()
        .find(|r| r["interval"] == "1m")
        .expect("historical request");
    assert_eq!(historical["tag"], "Boiler Temp");
    assert_eq!(historical["start"], "*-10m");
    assert_eq!(historical["end"], "*");
    assert_eq!(historical["maxCount"], "10");
    let instant = requests
        .iter()
        .find(|r| r["interval"] == "1s")
        .expect("instant request");
    assert_eq!(instant["maxCount"], "1");
}

#[tokio::test]
async fn test_instant_failure_falls_back() {
    let (base_url, _log) = spawn_historian().await;
    let engine = HistorianEngine::from_config(&config(&base_url)).unwrap();

    let result = engine
        .execute(
            &RawQuery::new("SELECT * FROM Point WHERE tag = 'BROKEN_INSTANT'")
                .interval(Interval::OneMinute),
        )
        .await
        .unwrap();

    assert!(result.metadata.is_fallback);
    assert_eq!(result.metadata.real_time_count, 0);
    assert_eq!(result.len(), 2);
    let reason = result.metadata.fallback_reason.unwrap();
    assert!(reason.contains("HTTP 500"), "{}", reason);
    assert!(reason.contains("instant store offline"), "{}", reason);
}

#[tokio::test]
async fn test_slow_historian_times_out() {
    let (base_url, _log) = spawn_historian().await;
    let engine = HistorianEngine::from_config(&config(&base_url)).unwrap();

    let err = engine
        .execute(
            &RawQuery::new("SELECT * FROM Point WHERE tag = 'SLOW'").interval(Interval::OneHour),
        )
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "{}", err);
}

#[tokio::test]
async fn test_non_json_body_is_upstream_error() {
    let (base_url, _log) = spawn_historian().await;
    let engine = HistorianEngine::from_config(&config(&base_url)).unwrap();

    let err = engine
        .execute(&RawQuery::new("history").tag("GARBAGE").interval(Interval::OneHour))
        .await
        .unwrap_err();

    assert!(matches!(err, HistorianError::Upstream(_)));
    assert!(!err.is_timeout());
    assert!(err.to_string().contains("not JSON"), "{}", err);
}

#[tokio::test]
async fn test_unreachable_historian() {
    // Bind then drop to get a port nothing listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let engine = HistorianEngine::from_config(&config(&format!("http://{}", addr))).unwrap();
    let err = engine
        .execute(&RawQuery::new("latest").tag("T1"))
        .await
        .unwrap_err();
    assert!(matches!(err, HistorianError::Upstream(_)));
}

#[tokio::test]
async fn test_api_round_trip() {
    let (base_url, log) = spawn_historian().await;
    let historian = HistorianConfig {
        default_tag: Some("T1".to_string()),
        ..config(&base_url)
    };
    let source = HistorianSource::from_config(historian).unwrap();
    let state = AppState::new(
        Arc::new(source),
        SourceRegistry::with_builtin().kinds(),
        ApiConfig::default(),
    );
    let app = build_router(state);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/query")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    r#"{"query": "SELECT * FROM Point LIMIT 2", "interval": "5m", "dual": false}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["metadata"]["query_type"], "single");
    assert_eq!(body["metadata"]["tag"], "T1");
    assert_eq!(body["samples"].as_array().unwrap().len(), 2);
    assert_eq!(body["metadata"]["historical"]["start"], "*-10m");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health/ready")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // query + readiness probe
    assert_eq!(log.lock().unwrap().len(), 2);
}
