//! Query Routes
//!
//! - POST /api/v1/query - Execute a query against the active source

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::dto::QueryRequest;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::historian::ExecutionResult;

/// POST /api/v1/query
///
/// Execute query text (declarative, preset keyword or historian URL) and
/// return the merged samples with execution metadata.
pub async fn execute_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> ApiResult<Json<ExecutionResult>> {
    if req.query.trim().is_empty() {
        return Err(ApiError::Validation("query cannot be empty".to_string()));
    }
    if req.options.limit == Some(0) {
        return Err(ApiError::Validation("limit must be positive".to_string()));
    }

    let result = state.source.execute(&req.query, req.options).await?;

    tracing::info!(
        execution_id = %result.execution_id,
        source = %state.source.kind(),
        count = result.len(),
        "Query served"
    );

    Ok(Json(result))
}
