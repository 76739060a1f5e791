//! REST API handlers.
//!
//! Each handler calls into the `Scheduler` and wraps the outcome in the
//! common `{success, data, error}` envelope.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use tern_core::{FullTaskId, SchedulingRequest, hex_bytes};
use tern_scheduler::SchedulerError;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

/// Map a scheduler error to the HTTP status the caller sees.
fn status_of(err: &SchedulerError) -> StatusCode {
    match err {
        SchedulerError::Validation(_) | SchedulerError::InvalidAddress { .. } => {
            StatusCode::BAD_REQUEST
        }
        SchedulerError::UnknownApplication(_) => StatusCode::NOT_FOUND,
        SchedulerError::Rpc(_) => StatusCode::BAD_GATEWAY,
        SchedulerError::NotEnoughBackends { .. }
        | SchedulerError::Placement(_)
        | SchedulerError::State(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn scheduler_error(err: SchedulerError) -> Response {
    error_response(&err.to_string(), status_of(&err))
}

// ── Frontends ──────────────────────────────────────────────────

/// Frontend registration body.
#[derive(Debug, Deserialize)]
pub struct RegisterFrontend {
    pub app_id: String,
    /// `host:port` the frontend receives status messages on.
    pub address: String,
}

#[derive(Debug, Serialize)]
struct Registered {
    registered: bool,
}

/// POST /api/v1/frontends
pub async fn register_frontend(
    State(state): State<ApiState>,
    Json(req): Json<RegisterFrontend>,
) -> Response {
    match state
        .scheduler
        .register_frontend(&req.app_id, &req.address)
        .await
    {
        Ok(registered) => ApiResponse::ok(Registered { registered }).into_response(),
        Err(e) => scheduler_error(e),
    }
}

// ── Jobs ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Accepted {
    accepted: bool,
}

/// POST /api/v1/jobs
pub async fn submit_job(
    State(state): State<ApiState>,
    Json(request): Json<SchedulingRequest>,
) -> Response {
    debug!(app_id = %request.app_id, tasks = request.tasks.len(), "job submitted");
    match state.scheduler.submit_job(request).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            ApiResponse::ok(Accepted { accepted: true }),
        )
            .into_response(),
        Err(e) => scheduler_error(e),
    }
}

/// POST /api/v1/jobs/placement
pub async fn get_placement(
    State(state): State<ApiState>,
    Json(request): Json<SchedulingRequest>,
) -> Response {
    match state.scheduler.get_placement(request).await {
        Ok(placements) => ApiResponse::ok(placements).into_response(),
        Err(e) => scheduler_error(e),
    }
}

// ── Status relay ───────────────────────────────────────────────

/// Task status reported by a node monitor.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusMessage {
    pub app_id: String,
    pub task: FullTaskId,
    pub status: i32,
    #[serde(default, with = "hex_bytes")]
    pub message: Vec<u8>,
}

/// POST /api/v1/messages
pub async fn frontend_message(
    State(state): State<ApiState>,
    Json(msg): Json<StatusMessage>,
) -> Response {
    match state
        .scheduler
        .send_frontend_message(&msg.app_id, &msg.task, msg.status, &msg.message)
        .await
    {
        Ok(()) => ApiResponse::ok("delivered").into_response(),
        Err(e) => scheduler_error(e),
    }
}

// ── Health ─────────────────────────────────────────────────────

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    ApiResponse::ok("ok")
}
