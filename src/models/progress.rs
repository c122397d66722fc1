use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    Generating,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

/// Progress record of a single generation job, owned by its coordinator actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub game_id: String,
    pub total: u32,
    pub generated: u32,
    pub status: JobStatus,
    pub errors: Vec<String>,
    pub start_time: DateTime<Utc>,
}

impl JobProgress {
    pub fn new(game_id: String, total: u32, start_time: DateTime<Utc>) -> Self {
        Self {
            game_id,
            total,
            generated: 0,
            status: JobStatus::Waiting,
            errors: Vec::new(),
            start_time,
        }
    }

    /// Capped at 95 until the record is completed, so pollers never see 100 early.
    pub fn progress_percent(&self) -> u32 {
        if self.status == JobStatus::Completed {
            return 100;
        }
        if self.total == 0 {
            return 0;
        }
        let pct = (u64::from(self.generated) * 100) / u64::from(self.total);
        pct.min(95) as u32
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            game_id: self.game_id.clone(),
            total: self.total,
            generated: self.generated,
            status: self.status,
            errors: self.errors.clone(),
            start_time: self.start_time,
            progress_percent: self.progress_percent(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub game_id: String,
    pub total: u32,
    pub generated: u32,
    pub status: JobStatus,
    pub errors: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub progress_percent: u32,
}
