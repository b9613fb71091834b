//! Source Routes
//!
//! - GET /api/v1/sources - Active source and registered kinds
//! - GET /api/v1/schema - Tables, columns and intervals of the active source

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::dto::SourcesResponse;
use crate::api::state::AppState;
use crate::sources::SourceSchema;

/// GET /api/v1/sources
pub async fn list_sources(State(state): State<Arc<AppState>>) -> Json<SourcesResponse> {
    Json(SourcesResponse {
        active: state.source.kind().to_string(),
        description: state.source.description().to_string(),
        kinds: state.source_kinds.clone(),
    })
}

/// GET /api/v1/schema
pub async fn get_schema(State(state): State<Arc<AppState>>) -> Json<SourceSchema> {
    Json(state.source.schema())
}
