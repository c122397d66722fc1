use crate::{
    dto::job_dto::{CleanupUsagePayload, UsageStatsQuery, UsageStatsResponse},
    error::Result,
    services::quiz_store::ReferenceUsage,
    AppState,
};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use validator::Validate;

const DEFAULT_STATS_DAYS: i64 = 7;
const SESSION_TOP_LIMIT: usize = 10;

pub async fn usage_stats(
    State(state): State<AppState>,
    Query(query): Query<UsageStatsQuery>,
) -> Result<impl IntoResponse> {
    let days = query.days.unwrap_or(DEFAULT_STATS_DAYS).clamp(1, 365);
    let stats = state.store.usage_stats(days).await?;

    let session_top = state
        .session
        .top(SESSION_TOP_LIMIT)
        .into_iter()
        .map(|(reference, count)| ReferenceUsage {
            reference,
            frequency: i64::from(count),
        })
        .collect();

    Ok(Json(UsageStatsResponse {
        days,
        count: stats.count,
        last_n_days: stats.last_n_days,
        session_total: state.session.total(),
        session_top,
    }))
}

#[axum::debug_handler]
pub async fn cleanup_usage(
    State(state): State<AppState>,
    Json(payload): Json<CleanupUsagePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let deleted = state.store.delete_usage_older_than(payload.days).await?;
    tracing::info!(days = payload.days, deleted, "Cleaned up reference usage");
    Ok(Json(json!({ "deleted": deleted })))
}
