//! Location API handlers

use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::responses::{accepted, bad_request, handle_result};
use super::AppState;
use crate::ingestor::spawn_load;
use crate::models::{DivisionLevel, LoadTrigger};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub name: Option<String>,
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now(),
    }))
}

pub async fn load_status(State(state): State<AppState>) -> Response {
    handle_result(state.lookup.status().await)
}

pub async fn search_locations(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    let Some(name) = params.name.filter(|name| !name.trim().is_empty()) else {
        return bad_request("Query parameter 'name' is required");
    };
    handle_result(state.lookup.search(&name).await)
}

pub async fn get_province(State(state): State<AppState>, Path(code): Path<u32>) -> Response {
    handle_result(state.lookup.get_division(DivisionLevel::Province, code).await)
}

pub async fn get_district(State(state): State<AppState>, Path(code): Path<u32>) -> Response {
    handle_result(state.lookup.get_division(DivisionLevel::District, code).await)
}

pub async fn get_ward(State(state): State<AppState>, Path(code): Path<u32>) -> Response {
    handle_result(state.lookup.get_division(DivisionLevel::Ward, code).await)
}

pub async fn trigger_load(State(state): State<AppState>) -> Response {
    info!("Manual location load requested");
    spawn_load(state.loader.clone(), LoadTrigger::Manual, false);
    accepted("Location load started")
}

pub async fn trigger_refresh(State(state): State<AppState>) -> Response {
    info!("Manual location refresh requested");
    spawn_load(state.loader.clone(), LoadTrigger::Manual, true);
    accepted("Location refresh started")
}
