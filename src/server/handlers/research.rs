use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::rag::{DocumentStore, Passage, SeedRecord};
use crate::research::{ResearchRequest, ResearchResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InsertPassagesRequest {
    pub records: Vec<SeedRecord>,
}

pub async fn research(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ResearchRequest>, JsonRejection>,
) -> Result<Json<ResearchResponse>, ApiError> {
    let Json(request) = payload?;
    let answer = state.research.research(request).await?;
    Ok(Json(ResearchResponse::from(answer)))
}

pub async fn insert_passages(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<InsertPassagesRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let passages: Vec<Passage> = payload.records.into_iter().map(Passage::from).collect();
    let inserted = passages.len();
    state.store.insert(passages).await?;
    let total = state.store.count().await?;

    Ok(Json(json!({
        "inserted": inserted,
        "total": total
    })))
}

pub async fn get_passage(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Passage>, ApiError> {
    state
        .store
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("passage '{}'", id)))
}

pub async fn delete_passage(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.store.delete(&id).await? {
        return Err(ApiError::NotFound(format!("passage '{}'", id)));
    }
    Ok(Json(json!({ "deleted": id })))
}
