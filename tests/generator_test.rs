mod common;

use common::{fast_settings, StubClient};
use quiz_backend::models::item::Difficulty;
use quiz_backend::models::progress::JobStatus;
use quiz_backend::services::canon::{self, Testament};
use quiz_backend::services::generator::{GenerationError, Generator, GeneratorSettings};
use quiz_backend::services::orchestrator::Orchestrator;
use quiz_backend::services::progress_service::ProgressRegistry;
use quiz_backend::services::quiz_store::{MemoryQuizStore, QuizStore};
use quiz_backend::services::reference_selector::SessionUsage;
use quiz_backend::utils::text::book_of;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn generator(
    client: Arc<StubClient>,
    store: Arc<MemoryQuizStore>,
    settings: GeneratorSettings,
    seed: u64,
) -> Generator {
    Generator::with_rng(
        client,
        store,
        Arc::new(SessionUsage::new()),
        settings,
        StdRng::seed_from_u64(seed),
    )
}

#[tokio::test(start_paused = true)]
async fn easy_batch_from_well_formed_payloads() {
    let client = Arc::new(StubClient::unique_items());
    let store = Arc::new(MemoryQuizStore::new());
    let mut gen = generator(client.clone(), store.clone(), fast_settings(), 1);

    let items = gen
        .generate_batch(Difficulty::Easy, 5, Some("job-a"))
        .await
        .expect("batch");

    assert_eq!(items.len(), 5);
    assert!(items.iter().all(|i| i.points == 10 && i.generated));
    assert!(items.iter().all(|i| i.has_valid_options()));
    assert!(items.iter().all(|i| i.difficulty == Difficulty::Easy));

    let references: HashSet<&str> = items.iter().map(|i| i.reference.as_str()).collect();
    assert_eq!(references.len(), 5);
    let texts: HashSet<&str> = items.iter().map(|i| i.text.as_str()).collect();
    assert_eq!(texts.len(), 5);
    let ids: HashSet<&str> = items.iter().map(|i| i.unique_id.as_str()).collect();
    assert_eq!(ids.len(), 5);

    let stored = store.items_for("job-a").await;
    let sequences: Vec<u32> = stored.iter().map(|s| s.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
    assert_eq!(store.usage_stats(1).await.unwrap().count, 5);

    assert!(client.prompts().iter().all(|p| p.contains("easy")));
}

#[tokio::test(start_paused = true)]
async fn rate_limited_calls_are_retried_until_the_batch_fills() {
    let client = Arc::new(StubClient::rate_limited_first(2));
    let store = Arc::new(MemoryQuizStore::new());
    let settings = GeneratorSettings {
        parallelism: 1,
        ..fast_settings()
    };
    let rate_limit = settings.rate_limit_delay;
    let mut gen = generator(client.clone(), store, settings, 2);

    let started = tokio::time::Instant::now();
    let items = gen
        .generate_batch(Difficulty::Medium, 2, None)
        .await
        .expect("batch");

    assert_eq!(items.len(), 2);
    assert!(started.elapsed() >= rate_limit * 2);
    assert!(client.calls() >= 4);
}

#[tokio::test(start_paused = true)]
async fn output_without_json_exhausts_the_attempt_budget() {
    let client = Arc::new(StubClient::no_json());
    let store = Arc::new(MemoryQuizStore::new());
    let settings = GeneratorSettings {
        max_attempts: 4,
        ..fast_settings()
    };
    let (max_attempts, task_attempts) = (settings.max_attempts, settings.task_attempts);
    let mut gen = generator(client.clone(), store.clone(), settings, 3);

    let err = gen
        .generate_batch(Difficulty::Hard, 2, Some("job-c"))
        .await
        .unwrap_err();

    match err {
        GenerationError::Exhausted {
            generated,
            requested,
            attempts,
        } => {
            assert_eq!(generated, 0);
            assert_eq!(requested, 2);
            assert_eq!(attempts, max_attempts);
        }
        other => panic!("unexpected error: {other}"),
    }
    // every wave runs two tasks, each using all of its internal attempts
    assert_eq!(client.calls(), (max_attempts * 2 * task_attempts) as usize);
    assert!(store.items_for("job-c").await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn testament_mix_tracks_sixty_forty() {
    let client = Arc::new(StubClient::unique_items());
    let store = Arc::new(MemoryQuizStore::new());
    let settings = GeneratorSettings {
        parallelism: 1,
        max_attempts: 100,
        ..fast_settings()
    };
    let mut gen = generator(client, store, settings, 4);

    let items = gen
        .generate_batch(Difficulty::Medium, 10, None)
        .await
        .expect("batch");

    let old = items
        .iter()
        .filter(|i| canon::testament_of(book_of(&i.reference)) == Some(Testament::Old))
        .count();
    assert!((5..=7).contains(&old), "{} of 10 from the Old Testament", old);
}

#[tokio::test(start_paused = true)]
async fn globally_used_references_are_not_repeated() {
    let client = Arc::new(StubClient::unique_items());
    let store = Arc::new(MemoryQuizStore::new());
    let session = Arc::new(SessionUsage::new());

    let mut first = Generator::with_rng(
        client.clone(),
        store.clone(),
        session.clone(),
        fast_settings(),
        StdRng::seed_from_u64(5),
    );
    let batch_one = first
        .generate_batch(Difficulty::Easy, 6, None)
        .await
        .expect("first batch");

    let mut second = Generator::with_rng(
        client,
        store,
        session.clone(),
        fast_settings(),
        StdRng::seed_from_u64(5),
    );
    let batch_two = second
        .generate_batch(Difficulty::Easy, 6, None)
        .await
        .expect("second batch");

    let used: HashSet<&str> = batch_one.iter().map(|i| i.reference.as_str()).collect();
    assert!(batch_two.iter().all(|i| !used.contains(i.reference.as_str())));
    assert!(session.total() >= 12);
}

#[tokio::test(start_paused = true)]
async fn orchestrator_reports_completion() {
    let registry = ProgressRegistry::new(Duration::from_secs(3600));
    let orchestrator = Orchestrator::new(
        Arc::new(StubClient::unique_items()),
        Arc::new(MemoryQuizStore::new()),
        Arc::new(SessionUsage::new()),
        registry.clone(),
        fast_settings(),
    );

    let items = orchestrator
        .run_job("game-ok", Difficulty::Expert, 3)
        .await
        .expect("job");
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|i| i.points == 50));

    let snap = registry.get("game-ok").await.expect("progress");
    assert_eq!(snap.status, JobStatus::Completed);
    assert_eq!(snap.generated, 3);
    assert_eq!(snap.progress_percent, 100);
}

#[tokio::test(start_paused = true)]
async fn orchestrator_records_exhaustion_as_failure() {
    let registry = ProgressRegistry::new(Duration::from_secs(3600));
    let orchestrator = Orchestrator::new(
        Arc::new(StubClient::no_json()),
        Arc::new(MemoryQuizStore::new()),
        Arc::new(SessionUsage::new()),
        registry.clone(),
        GeneratorSettings {
            max_attempts: 2,
            ..fast_settings()
        },
    );

    let err = orchestrator
        .run_job("game-bad", Difficulty::Easy, 4)
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Exhausted { .. }));

    let snap = registry.get("game-bad").await.expect("progress");
    assert_eq!(snap.status, JobStatus::Error);
    assert_eq!(snap.generated, 0);
    assert_eq!(snap.errors, vec![err.to_string()]);
    assert!(snap.progress_percent < 100);
}
