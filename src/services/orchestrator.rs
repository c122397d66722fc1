use crate::models::item::{Difficulty, GeneratedItem};
use crate::services::completion_service::CompletionClient;
use crate::services::generator::{GenerationError, Generator, GeneratorSettings};
use crate::services::progress_service::ProgressRegistry;
use crate::services::quiz_store::QuizStore;
use crate::services::reference_selector::SessionUsage;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Runs jobs end to end: coordinator start, batch generation, terminal report.
#[derive(Clone)]
pub struct Orchestrator {
    client: Arc<dyn CompletionClient>,
    store: Arc<dyn QuizStore>,
    session: Arc<SessionUsage>,
    registry: ProgressRegistry,
    settings: GeneratorSettings,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        store: Arc<dyn QuizStore>,
        session: Arc<SessionUsage>,
        registry: ProgressRegistry,
        settings: GeneratorSettings,
    ) -> Self {
        Self {
            client,
            store,
            session,
            registry,
            settings,
        }
    }

    pub fn registry(&self) -> &ProgressRegistry {
        &self.registry
    }

    pub async fn run_job(
        &self,
        job_id: &str,
        difficulty: Difficulty,
        count: u32,
    ) -> Result<Vec<GeneratedItem>, GenerationError> {
        self.registry.start(job_id, count).await;
        self.execute(job_id, difficulty, count).await
    }

    /// Starts the coordinator before returning so callers can poll right away;
    /// generation itself continues on a background task.
    pub async fn submit(
        &self,
        job_id: String,
        difficulty: Difficulty,
        count: u32,
    ) -> JoinHandle<()> {
        self.registry.start(&job_id, count).await;
        let this = self.clone();
        tokio::spawn(async move {
            let _ = this.execute(&job_id, difficulty, count).await;
        })
    }

    async fn execute(
        &self,
        job_id: &str,
        difficulty: Difficulty,
        count: u32,
    ) -> Result<Vec<GeneratedItem>, GenerationError> {
        self.registry.update(job_id, Some(0), None, None).await;

        let mut generator = Generator::new(
            Arc::clone(&self.client),
            Arc::clone(&self.store),
            Arc::clone(&self.session),
            self.settings.clone(),
        )
        .with_progress(self.registry.clone());

        match generator
            .generate_batch(difficulty, count as usize, Some(job_id))
            .await
        {
            Ok(items) => {
                self.registry.complete(job_id).await;
                tracing::info!(job_id = %job_id, count = items.len(), "Job completed");
                Ok(items)
            }
            Err(e) => {
                self.registry.fail(job_id, e.to_string()).await;
                tracing::error!(job_id = %job_id, error = %e, "Job failed");
                Err(e)
            }
        }
    }
}
