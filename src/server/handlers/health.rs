use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::rag::DocumentStore;
use crate::state::AppState;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Legal research API",
        "status": "online"
    }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let passages = state.store.count().await?;
    Ok(Json(json!({
        "status": "healthy",
        "passages": passages
    })))
}
