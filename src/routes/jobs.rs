use crate::{
    dto::job_dto::{CreateJobPayload, CreateJobResponse, FailJobPayload, UpdateProgressPayload},
    error::{Error, Result},
    models::progress::JobStatus,
    AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

#[axum::debug_handler]
pub async fn create_job(
    State(state): State<AppState>,
    Json(payload): Json<CreateJobPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    if payload.count > state.config.max_items_per_job {
        return Err(Error::BadRequest(format!(
            "count must not exceed {}",
            state.config.max_items_per_job
        )));
    }

    let game_id = payload
        .game_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    tracing::info!(
        job_id = %game_id,
        difficulty = %payload.difficulty,
        count = payload.count,
        "Accepted generation job"
    );
    state
        .orchestrator
        .submit(game_id.clone(), payload.difficulty, payload.count)
        .await;

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateJobResponse {
            game_id,
            status: JobStatus::Waiting,
        }),
    ))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let snapshot = state
        .progress
        .get(&id)
        .await
        .ok_or_else(|| job_not_found(&id))?;
    Ok(Json(snapshot))
}

#[axum::debug_handler]
pub async fn update_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateProgressPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    if !state
        .progress
        .update(&id, payload.generated, payload.total, payload.error)
        .await
    {
        return Err(job_not_found(&id));
    }
    current(&state, &id).await
}

pub async fn complete_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    if !state.progress.complete(&id).await {
        return Err(job_not_found(&id));
    }
    current(&state, &id).await
}

#[axum::debug_handler]
pub async fn fail_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<FailJobPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    if !state.progress.fail(&id, payload.error).await {
        return Err(job_not_found(&id));
    }
    current(&state, &id).await
}

async fn current(state: &AppState, id: &str) -> Result<impl IntoResponse> {
    let snapshot = state
        .progress
        .get(id)
        .await
        .ok_or_else(|| job_not_found(id))?;
    Ok(Json(snapshot))
}

fn job_not_found(id: &str) -> Error {
    Error::NotFound(format!("Job {} not found", id))
}
