//! tern-api: REST API for the tern scheduler.
//!
//! Frontends register themselves and submit batches here; node monitors
//! relay task status back through the messages route.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/frontends` | Register an application frontend |
//! | POST | `/api/v1/jobs` | Place and launch a batch of tasks |
//! | POST | `/api/v1/jobs/placement` | Compute a placement without launching |
//! | POST | `/api/v1/messages` | Relay a task status message to its frontend |
//! | GET | `/healthz` | Liveness |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tern_scheduler::Scheduler;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub scheduler: Arc<Scheduler>,
}

/// Build the complete API router.
pub fn build_router(scheduler: Arc<Scheduler>) -> Router {
    let api_state = ApiState { scheduler };

    let api_routes = Router::new()
        .route("/frontends", post(handlers::register_frontend))
        .route("/jobs", post(handlers::submit_job))
        .route("/jobs/placement", post(handlers::get_placement))
        .route("/messages", post(handlers::frontend_message))
        .with_state(api_state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(handlers::healthz))
}
