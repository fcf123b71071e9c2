use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::pipeline::orchestrator::new_run_id;
use crate::pipeline::{Pipeline, PipelineOutcome};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub events_tx: broadcast::Sender<String>,
}

pub type SharedState = Arc<AppState>;

// ── Request / response payloads ───────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AppRequest {
    pub user_request: String,
}

impl AppRequest {
    fn validated(&self) -> Result<&str, ApiError> {
        let request = self.user_request.trim();
        if request.is_empty() {
            return Err(ApiError::BadRequest("user_request must not be empty".into()));
        }
        Ok(request)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Accepted {
    pub message: String,
    pub run_id: String,
}

// ── Error type ────────────────────────────────────────────────────────

pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/apps", get(list_apps).post(create_app))
        .route("/api/apps/background", post(create_app_background))
        .route("/api/apps/{deployment_id}", get(get_app))
        .route("/api/apps/{deployment_id}/edit", post(edit_app))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

/// Run the create flow and answer with its outcome. A failed run is still 200.
async fn create_app(
    State(state): State<SharedState>,
    Json(body): Json<AppRequest>,
) -> Result<Json<PipelineOutcome>, ApiError> {
    let request = body.validated()?;
    Ok(Json(state.pipeline.create_app(request).await))
}

async fn create_app_background(
    State(state): State<SharedState>,
    Json(body): Json<AppRequest>,
) -> Result<(StatusCode, Json<Accepted>), ApiError> {
    let request = body.validated()?.to_string();
    let run_id = new_run_id();
    let pipeline = state.pipeline.clone();
    let task_run_id = run_id.clone();
    tokio::spawn(async move {
        let outcome = pipeline.create_app_with_run_id(task_run_id.clone(), &request).await;
        tracing::info!(run_id = %task_run_id, success = outcome.success, "Background run finished");
    });
    Ok((
        StatusCode::ACCEPTED,
        Json(Accepted {
            message: "App generation started".to_string(),
            run_id,
        }),
    ))
}

async fn edit_app(
    State(state): State<SharedState>,
    Path(deployment_id): Path<String>,
    Json(body): Json<AppRequest>,
) -> Result<Json<PipelineOutcome>, ApiError> {
    let request = body.validated()?;
    Ok(Json(state.pipeline.edit_app(request, &deployment_id).await))
}

async fn list_apps(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let apps = state
        .pipeline
        .catalog()
        .list()
        .await
        .map_err(|e| ApiError::Internal(format!("{:#}", e)))?;
    Ok(Json(apps))
}

async fn get_app(
    State(state): State<SharedState>,
    Path(deployment_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let app = state
        .pipeline
        .catalog()
        .find_by_deployment(&deployment_id)
        .await
        .map_err(|e| ApiError::Internal(format!("{:#}", e)))?
        .ok_or_else(|| ApiError::NotFound(format!("No app for deployment {}", deployment_id)))?;
    Ok(Json(app))
}
