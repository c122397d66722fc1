use crate::models::item::Difficulty;
use crate::models::progress::JobStatus;
use crate::services::quiz_store::ReferenceUsage;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateJobPayload {
    #[validate(length(min = 1, max = 128, message = "game_id must be 1-128 characters"))]
    pub game_id: Option<String>,
    pub difficulty: Difficulty,
    #[validate(range(min = 1, message = "count must be at least 1"))]
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobResponse {
    pub game_id: String,
    pub status: JobStatus,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProgressPayload {
    pub generated: Option<u32>,
    pub total: Option<u32>,
    #[validate(length(min = 1))]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FailJobPayload {
    #[validate(length(min = 1, message = "error must not be empty"))]
    pub error: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UsageStatsQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageStatsResponse {
    pub days: i64,
    pub count: i64,
    pub last_n_days: i64,
    pub session_total: u32,
    pub session_top: Vec<ReferenceUsage>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CleanupUsagePayload {
    #[validate(range(min = 1, max = 3650, message = "days must be between 1 and 3650"))]
    pub days: i64,
}
