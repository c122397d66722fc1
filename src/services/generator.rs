use crate::models::item::{Difficulty, GeneratedItem};
use crate::services::canon;
use crate::services::completion_service::{
    CompletionClient, CompletionRequest, RetryDelays, SamplingParams,
};
use crate::services::duplicate_guard::DuplicateGuard;
use crate::services::progress_service::ProgressRegistry;
use crate::services::quiz_store::{BestEffortSink, QuizStore};
use crate::services::reference_selector::{ReferenceSelector, SessionUsage};
use crate::services::response_parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;

const SYSTEM_PROMPT: &str = "You write multiple-choice Bible quiz questions. \
Every question must have exactly one correct answer that can be verified directly from the cited passage. \
Respond with a single JSON object and nothing else.";

#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub parallelism: usize,
    pub max_attempts: u32,
    pub task_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_multiplier: f64,
    pub backoff_cap: Duration,
    pub rate_limit_delay: Duration,
    pub server_error_delay: Duration,
    pub client_error_delay: Duration,
    pub wave_delay: Duration,
    pub wave_jitter: Duration,
    pub usage_snapshot_limit: i64,
    pub old_testament_target_percent: u32,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            parallelism: 3,
            max_attempts: 30,
            task_attempts: 3,
            backoff_base: Duration::from_millis(1000),
            backoff_multiplier: 2.0,
            backoff_cap: Duration::from_millis(8000),
            rate_limit_delay: Duration::from_millis(5000),
            server_error_delay: Duration::from_millis(2000),
            client_error_delay: Duration::from_millis(1000),
            wave_delay: Duration::from_millis(500),
            wave_jitter: Duration::from_millis(250),
            usage_snapshot_limit: 500,
            old_testament_target_percent: 60,
        }
    }
}

impl GeneratorSettings {
    pub fn retry_delays(&self) -> RetryDelays {
        RetryDelays {
            rate_limit: self.rate_limit_delay,
            server_error: self.server_error_delay,
            client_error: self.client_error_delay,
        }
    }

    /// Wait before internal attempt `attempt` (zero-based); nothing before the first.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = self.backoff_multiplier.powi(attempt as i32 - 1);
        let millis = self.backoff_base.as_millis() as f64 * factor;
        Duration::from_millis(millis as u64).min(self.backoff_cap)
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generated only {generated} of {requested} items after {attempts} attempts")]
    Exhausted {
        generated: usize,
        requested: usize,
        attempts: u32,
    },

    #[error("Invalid generation request: {0}")]
    InvalidRequest(String),
}

pub struct Generator {
    client: Arc<dyn CompletionClient>,
    store: Arc<dyn QuizStore>,
    sink: BestEffortSink,
    settings: GeneratorSettings,
    selector: ReferenceSelector,
    guard: DuplicateGuard,
    rng: StdRng,
    progress: Option<ProgressRegistry>,
}

impl Generator {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        store: Arc<dyn QuizStore>,
        session: Arc<SessionUsage>,
        settings: GeneratorSettings,
    ) -> Self {
        Self::with_rng(client, store, session, settings, StdRng::from_entropy())
    }

    pub fn with_rng(
        client: Arc<dyn CompletionClient>,
        store: Arc<dyn QuizStore>,
        session: Arc<SessionUsage>,
        settings: GeneratorSettings,
        rng: StdRng,
    ) -> Self {
        let selector = ReferenceSelector::new(session, settings.old_testament_target_percent);
        Self {
            sink: BestEffortSink::new(Arc::clone(&store)),
            client,
            store,
            settings,
            selector,
            guard: DuplicateGuard::new(),
            rng,
            progress: None,
        }
    }

    /// Reports accepted counts to the job's coordinator while generating.
    pub fn with_progress(mut self, registry: ProgressRegistry) -> Self {
        self.progress = Some(registry);
        self
    }

    pub async fn generate_batch(
        &mut self,
        difficulty: Difficulty,
        count: usize,
        job_id: Option<&str>,
    ) -> Result<Vec<GeneratedItem>, GenerationError> {
        if count == 0 {
            return Err(GenerationError::InvalidRequest(
                "count must be at least 1".to_string(),
            ));
        }

        let batch_id = job_id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        self.begin_batch().await;

        let pool = canon::book_names();
        let mut accepted: Vec<GeneratedItem> = Vec::with_capacity(count);
        let mut attempts = 0u32;

        tracing::info!(
            job_id = %batch_id,
            difficulty = %difficulty,
            count,
            "Starting generation batch"
        );

        while accepted.len() < count && attempts < self.settings.max_attempts {
            attempts += 1;
            let wave_size = self.settings.parallelism.max(1).min(count - accepted.len());

            let mut tasks = JoinSet::new();
            let mut pending: Vec<String> = Vec::with_capacity(wave_size);
            for _ in 0..wave_size {
                let selected = self
                    .selector
                    .select_reference(&pool, difficulty, &mut self.rng);
                let Some(reference) = selected else {
                    break;
                };
                let task = CandidateTask {
                    client: Arc::clone(&self.client),
                    settings: self.settings.clone(),
                    difficulty,
                    seed: self.rng.gen(),
                    reference: reference.clone(),
                };
                pending.push(reference);
                tasks.spawn(task.run());
            }

            let mut results = Vec::with_capacity(wave_size);
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(result) => {
                        if let Some(pos) = pending.iter().position(|r| *r == result.0) {
                            pending.swap_remove(pos);
                        }
                        results.push(result);
                    }
                    Err(e) => tracing::error!(job_id = %batch_id, "Candidate task failed: {}", e),
                }
            }
            // references of tasks that panicked or were cancelled
            for reference in pending {
                self.selector.release(&reference);
            }

            for (reference, candidate) in results {
                match candidate {
                    Some(item) if accepted.len() < count => {
                        self.consider(&batch_id, item, &reference, &mut accepted)
                            .await;
                    }
                    _ => self.selector.release(&reference),
                }
            }

            if accepted.len() < count && attempts < self.settings.max_attempts {
                tokio::time::sleep(self.wave_pause()).await;
            }
        }

        if accepted.len() < count {
            tracing::error!(
                job_id = %batch_id,
                generated = accepted.len(),
                requested = count,
                attempts,
                "Generation attempts exhausted"
            );
            return Err(GenerationError::Exhausted {
                generated: accepted.len(),
                requested: count,
                attempts,
            });
        }

        tracing::info!(job_id = %batch_id, count, attempts, "Generation batch finished");
        Ok(accepted)
    }

    async fn begin_batch(&mut self) {
        let snapshot = match self
            .store
            .usage_snapshot(self.settings.usage_snapshot_limit)
            .await
        {
            Ok(rows) => rows
                .into_iter()
                .map(|r| (r.reference, u32::try_from(r.frequency).unwrap_or(u32::MAX)))
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Could not load usage snapshot, continuing without it");
                HashMap::new()
            }
        };
        self.selector.begin_batch(snapshot);
        self.guard = DuplicateGuard::new();
    }

    async fn consider(
        &mut self,
        batch_id: &str,
        mut item: GeneratedItem,
        reference: &str,
        accepted: &mut Vec<GeneratedItem>,
    ) {
        if item.reference.trim().is_empty() {
            item.reference = reference.to_string();
        }

        if let Some(reason) = self.guard.check(&item, accepted) {
            tracing::info!(
                job_id = %batch_id,
                reference = %item.reference,
                reason = %reason,
                "Rejected candidate"
            );
            self.selector.release(reference);
            return;
        }

        self.guard.remember(&item);
        let sequence = accepted.len() as u32 + 1;
        self.sink.persist_item(batch_id, &item, sequence).await;
        self.sink.record_usage(&item.reference).await;
        tracing::debug!(job_id = %batch_id, sequence, reference = %item.reference, "Accepted item");
        accepted.push(item);

        if let Some(progress) = &self.progress {
            progress
                .update(batch_id, Some(accepted.len() as u32), None, None)
                .await;
        }
    }

    fn wave_pause(&mut self) -> Duration {
        let jitter_ms = self.settings.wave_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            self.rng.gen_range(0..=jitter_ms)
        };
        self.settings.wave_delay + Duration::from_millis(jitter)
    }
}

struct CandidateTask {
    client: Arc<dyn CompletionClient>,
    settings: GeneratorSettings,
    difficulty: Difficulty,
    seed: u32,
    reference: String,
}

impl CandidateTask {
    async fn run(self) -> (String, Option<GeneratedItem>) {
        let item = self.attempt_all().await;
        (self.reference, item)
    }

    async fn attempt_all(&self) -> Option<GeneratedItem> {
        let request = CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            prompt: build_prompt(&self.reference, self.difficulty, self.seed),
            sampling: SamplingParams::for_difficulty(self.difficulty),
        };
        let delays = self.settings.retry_delays();

        for attempt in 0..self.settings.task_attempts {
            let backoff = self.settings.backoff_delay(attempt);
            if !backoff.is_zero() {
                tokio::time::sleep(backoff).await;
            }

            let outcome = match self.client.complete(&request).await {
                Ok(response) => response.into_text(),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(raw) => match response_parser::parse(&raw, self.difficulty) {
                    Some(item) => return Some(item),
                    None => tracing::warn!(
                        reference = %self.reference,
                        attempt = attempt + 1,
                        "Completion did not contain a usable item"
                    ),
                },
                Err(e) if !e.is_retryable() => {
                    tracing::error!(
                        reference = %self.reference,
                        attempt = attempt + 1,
                        error = %e,
                        "Completion failed permanently"
                    );
                    return None;
                }
                Err(e) => {
                    let delay = e.retry_delay(&delays);
                    tracing::warn!(
                        reference = %self.reference,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Completion failed, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        None
    }
}

pub fn build_prompt(reference: &str, difficulty: Difficulty, seed: u32) -> String {
    let depth = match difficulty {
        Difficulty::Easy => "a well-known detail a casual reader would remember",
        Difficulty::Medium => "a specific detail a regular reader would know",
        Difficulty::Hard => "a precise detail that requires careful reading",
        Difficulty::Expert => "an obscure but unambiguous detail only close study reveals",
    };
    format!(
        "Write one {difficulty} multiple-choice question based on {reference}.\n\
         Ask about {depth}.\n\
         The correct answer must be a single objective fact stated in {reference}; \
         do not ask for opinions, interpretations or applications.\n\
         Give three plausible but clearly wrong alternatives.\n\
         Variation seed: {seed}\n\
         Respond with JSON only, using exactly these keys:\n\
         {{\"question\": \"...\", \"correctAnswer\": \"...\", \"wrongAnswer1\": \"...\", \
         \"wrongAnswer2\": \"...\", \"wrongAnswer3\": \"...\", \"reference\": \"{reference}\"}}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::completion_service::{CompletionError, CompletionResponse};
    use crate::services::quiz_store::MockQuizStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NumberedClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionClient for NumberedClient {
        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<CompletionResponse, CompletionError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CompletionResponse::text(format!(
                r#"{{"question": "Item{n}alpha item{n}bravo item{n}charlie?", "correctAnswer": "Answer{n}", "wrongAnswer1": "Other{n}"}}"#
            )))
        }
    }

    struct FlakyClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionClient for FlakyClient {
        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<CompletionResponse, CompletionError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                panic!("client crashed");
            }
            Ok(CompletionResponse::text(format!(
                r#"{{"question": "Item{n}alpha item{n}bravo item{n}charlie?", "correctAnswer": "Answer{n}", "wrongAnswer1": "Other{n}"}}"#
            )))
        }
    }

    fn quiet_settings() -> GeneratorSettings {
        GeneratorSettings {
            wave_delay: Duration::ZERO,
            wave_jitter: Duration::ZERO,
            max_attempts: 60,
            ..GeneratorSettings::default()
        }
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let s = GeneratorSettings::default();
        assert_eq!(s.backoff_delay(0), Duration::ZERO);
        assert_eq!(s.backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(s.backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(s.backoff_delay(4), Duration::from_millis(8000));
        assert_eq!(s.backoff_delay(9), Duration::from_millis(8000));
    }

    #[test]
    fn prompt_embeds_reference_and_seed() {
        let p = build_prompt("Ruth 1:16", Difficulty::Hard, 4242);
        assert!(p.contains("Ruth 1:16"));
        assert!(p.contains("4242"));
        assert!(p.contains("\"correctAnswer\""));
        assert!(p.contains("hard"));
    }

    #[tokio::test]
    async fn zero_count_is_rejected() {
        let mut generator = Generator::new(
            Arc::new(NumberedClient { calls: AtomicUsize::new(0) }),
            Arc::new(MockQuizStore::new()),
            Arc::new(SessionUsage::new()),
            quiet_settings(),
        );
        let err = generator
            .generate_batch(Difficulty::Easy, 0, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn store_failures_do_not_abort_generation() {
        let mut store = MockQuizStore::new();
        store
            .expect_usage_snapshot()
            .times(1)
            .returning(|_| Err(crate::error::Error::Internal("offline".into())));
        store
            .expect_persist_item()
            .times(4)
            .returning(|_, _, _| Err(crate::error::Error::Internal("offline".into())));
        store
            .expect_record_usage()
            .times(4)
            .returning(|_| Err(crate::error::Error::Internal("offline".into())));

        let mut generator = Generator::with_rng(
            Arc::new(NumberedClient { calls: AtomicUsize::new(0) }),
            Arc::new(store),
            Arc::new(SessionUsage::new()),
            quiet_settings(),
            StdRng::seed_from_u64(17),
        );
        let items = generator
            .generate_batch(Difficulty::Medium, 4, Some("job-offline"))
            .await
            .unwrap();
        assert_eq!(items.len(), 4);
        assert!(items.iter().all(|i| i.points == 20));
    }

    #[tokio::test]
    async fn accepted_items_are_persisted_in_order() {
        let mut store = MockQuizStore::new();
        store.expect_usage_snapshot().returning(|_| Ok(Vec::new()));
        let mut seq = mockall::Sequence::new();
        for expected in 1..=3u32 {
            store
                .expect_persist_item()
                .withf(move |job, _, sequence| job == "job-seq" && *sequence == expected)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _, _| Ok(()));
        }
        store.expect_record_usage().times(3).returning(|_| Ok(()));

        let mut generator = Generator::with_rng(
            Arc::new(NumberedClient { calls: AtomicUsize::new(0) }),
            Arc::new(store),
            Arc::new(SessionUsage::new()),
            quiet_settings(),
            StdRng::seed_from_u64(99),
        );
        let items = generator
            .generate_batch(Difficulty::Easy, 3, Some("job-seq"))
            .await
            .unwrap();
        assert_eq!(items.len(), 3);
    }

    #[tokio::test]
    async fn crashed_candidate_task_frees_its_testament_slot() {
        let mut store = MockQuizStore::new();
        store.expect_usage_snapshot().returning(|_| Ok(Vec::new()));
        store.expect_persist_item().returning(|_, _, _| Ok(()));
        store.expect_record_usage().returning(|_| Ok(()));

        let mut generator = Generator::with_rng(
            Arc::new(FlakyClient { calls: AtomicUsize::new(0) }),
            Arc::new(store),
            Arc::new(SessionUsage::new()),
            GeneratorSettings {
                parallelism: 1,
                ..quiet_settings()
            },
            StdRng::seed_from_u64(5),
        );
        let items = generator
            .generate_batch(Difficulty::Easy, 3, Some("job-crash"))
            .await
            .unwrap();
        assert_eq!(items.len(), 3);

        let (old, new) = generator.selector.testament_counts();
        assert_eq!(old + new, items.len());
    }
}
