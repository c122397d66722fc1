use crate::models::progress::{JobProgress, JobStatus, ProgressSnapshot};
use crate::utils::time::{age, now};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};

const COMMAND_BUFFER: usize = 32;

#[derive(Debug)]
enum ProgressCommand {
    Update {
        generated: Option<u32>,
        total: Option<u32>,
        error: Option<String>,
        reply: oneshot::Sender<ProgressSnapshot>,
    },
    Complete {
        reply: oneshot::Sender<ProgressSnapshot>,
    },
    Fail {
        error: String,
        reply: oneshot::Sender<ProgressSnapshot>,
    },
    Get {
        reply: oneshot::Sender<ProgressSnapshot>,
    },
}

#[derive(Clone)]
struct ProgressHandle {
    tx: mpsc::Sender<ProgressCommand>,
    start_time: DateTime<Utc>,
}

impl ProgressHandle {
    fn spawn(progress: JobProgress) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let start_time = progress.start_time;
        tokio::spawn(run_coordinator(progress, rx));
        Self { tx, start_time }
    }

    async fn request(
        &self,
        build: impl FnOnce(oneshot::Sender<ProgressSnapshot>) -> ProgressCommand,
    ) -> Option<ProgressSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(build(reply_tx)).await.ok()?;
        reply_rx.await.ok()
    }
}

async fn run_coordinator(mut progress: JobProgress, mut rx: mpsc::Receiver<ProgressCommand>) {
    while let Some(command) = rx.recv().await {
        let reply = match command {
            ProgressCommand::Update {
                generated,
                total,
                error,
                reply,
            } => {
                apply_update(&mut progress, generated, total, error);
                reply
            }
            ProgressCommand::Complete { reply } => {
                apply_complete(&mut progress);
                reply
            }
            ProgressCommand::Fail { error, reply } => {
                apply_fail(&mut progress, error);
                reply
            }
            ProgressCommand::Get { reply } => reply,
        };
        let _ = reply.send(progress.snapshot());
    }
    tracing::debug!(job_id = %progress.game_id, "Progress coordinator stopped");
}

fn apply_update(
    progress: &mut JobProgress,
    generated: Option<u32>,
    total: Option<u32>,
    error: Option<String>,
) {
    if progress.status.is_terminal() {
        tracing::debug!(job_id = %progress.game_id, status = ?progress.status, "Ignoring update for finished job");
        return;
    }
    if progress.status == JobStatus::Waiting {
        progress.status = JobStatus::Generating;
    }
    if let Some(total) = total {
        progress.total = total.max(progress.generated);
    }
    if let Some(generated) = generated {
        progress.generated = progress.generated.max(generated.min(progress.total));
    }
    if let Some(error) = error {
        progress.errors.push(error);
    }
    if progress.total > 0 && progress.generated >= progress.total {
        progress.status = JobStatus::Completed;
    }
}

fn apply_complete(progress: &mut JobProgress) {
    if progress.status.is_terminal() {
        return;
    }
    progress.generated = progress.total;
    progress.status = JobStatus::Completed;
}

fn apply_fail(progress: &mut JobProgress, error: String) {
    if progress.status.is_terminal() {
        tracing::debug!(job_id = %progress.game_id, "Ignoring failure for finished job");
        return;
    }
    progress.status = JobStatus::Error;
    progress.errors.push(error);
}

/// Job id to coordinator lookup, shared by the generator and the HTTP layer.
#[derive(Clone)]
pub struct ProgressRegistry {
    jobs: Arc<RwLock<HashMap<String, ProgressHandle>>>,
    retention: Duration,
}

impl ProgressRegistry {
    pub fn new(retention: Duration) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            retention,
        }
    }

    /// Creates a fresh `waiting` record, replacing any existing one for the same id.
    pub async fn start(&self, job_id: &str, total: u32) -> ProgressSnapshot {
        self.start_at(job_id, total, now()).await
    }

    pub async fn start_at(
        &self,
        job_id: &str,
        total: u32,
        start_time: DateTime<Utc>,
    ) -> ProgressSnapshot {
        let progress = JobProgress::new(job_id.to_string(), total, start_time);
        let snapshot = progress.snapshot();
        let handle = ProgressHandle::spawn(progress);
        if self
            .jobs
            .write()
            .await
            .insert(job_id.to_string(), handle)
            .is_some()
        {
            tracing::warn!(job_id = %job_id, "Replaced existing progress record");
        }
        tracing::info!(job_id = %job_id, total, "Progress tracking started");
        snapshot
    }

    pub async fn update(
        &self,
        job_id: &str,
        generated: Option<u32>,
        total: Option<u32>,
        error: Option<String>,
    ) -> bool {
        self.write(job_id, "update", |reply| ProgressCommand::Update {
            generated,
            total,
            error,
            reply,
        })
        .await
    }

    pub async fn complete(&self, job_id: &str) -> bool {
        self.write(job_id, "complete", |reply| ProgressCommand::Complete { reply })
            .await
    }

    pub async fn fail(&self, job_id: &str, error: impl Into<String>) -> bool {
        let error = error.into();
        self.write(job_id, "fail", |reply| ProgressCommand::Fail { error, reply })
            .await
    }

    pub async fn get(&self, job_id: &str) -> Option<ProgressSnapshot> {
        let handle = self.handle(job_id).await?;
        handle.request(|reply| ProgressCommand::Get { reply }).await
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Drops every record older than the retention window, whatever its status.
    pub async fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(now()).await
    }

    pub async fn sweep_expired_at(&self, at: DateTime<Utc>) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, handle| age(handle.start_time, at) <= self.retention);
        let removed = before - jobs.len();
        if removed > 0 {
            tracing::info!(removed, remaining = jobs.len(), "Swept expired progress records");
        }
        removed
    }

    async fn handle(&self, job_id: &str) -> Option<ProgressHandle> {
        self.jobs.read().await.get(job_id).cloned()
    }

    async fn write(
        &self,
        job_id: &str,
        operation: &str,
        build: impl FnOnce(oneshot::Sender<ProgressSnapshot>) -> ProgressCommand,
    ) -> bool {
        let found = match self.handle(job_id).await {
            Some(handle) => handle.request(build).await.is_some(),
            None => false,
        };
        if !found {
            tracing::warn!(job_id = %job_id, operation, "Progress write for unknown job ignored");
        }
        found
    }
}
