//! Route table and stage-trigger handlers
//!
//! Each stage endpoint accepts GET or POST (cron services differ) and
//! replies 200 with a JSON summary even when individual items failed; only
//! a failure to run the batch at all becomes a 5xx.

use axum::{extract::State, middleware, routing::get, Json, Router};
use postpilot_core::AppError;
use postpilot_pipeline::StageSummary;

use crate::auth::cron_auth;
use crate::error::HttpAppError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let pipeline = Router::new()
        .route("/internal/pipeline/sync", get(run_sync).post(run_sync))
        .route("/internal/pipeline/analyze", get(run_analyze).post(run_analyze))
        .route("/internal/pipeline/group", get(run_group).post(run_group))
        .route(
            "/internal/pipeline/generate",
            get(run_generate).post(run_generate),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), cron_auth));

    Router::new()
        .route("/health", get(health))
        .merge(pipeline)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn run_sync(
    State(state): State<AppState>,
) -> Result<Json<StageSummary>, HttpAppError> {
    let summary = state.sync.run().await.map_err(AppError::from)?;
    Ok(Json(summary))
}

async fn run_analyze(
    State(state): State<AppState>,
) -> Result<Json<StageSummary>, HttpAppError> {
    let summary = state.analyzer.run().await.map_err(AppError::from)?;
    Ok(Json(summary))
}

async fn run_group(
    State(state): State<AppState>,
) -> Result<Json<StageSummary>, HttpAppError> {
    let summary = state.grouping.run().await.map_err(AppError::from)?;
    Ok(Json(summary))
}

async fn run_generate(
    State(state): State<AppState>,
) -> Result<Json<StageSummary>, HttpAppError> {
    let summary = state.generator.run().await.map_err(AppError::from)?;
    Ok(Json(summary))
}
