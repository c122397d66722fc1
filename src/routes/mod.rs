pub mod health;
pub mod jobs;
pub mod usage;

use crate::AppState;
use axum::{
    routing::{get, patch, post},
    Router,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/jobs", post(jobs::create_job))
        .route("/api/jobs/:id", get(jobs::get_job))
        .route("/api/jobs/:id/progress", patch(jobs::update_progress))
        .route("/api/jobs/:id/complete", post(jobs::complete_job))
        .route("/api/jobs/:id/fail", post(jobs::fail_job))
        .route("/api/usage/stats", get(usage::usage_stats))
        .route("/api/usage/cleanup", post(usage::cleanup_usage))
        .with_state(state)
}
