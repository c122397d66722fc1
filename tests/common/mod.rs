#![allow(dead_code)]

use async_trait::async_trait;
use quiz_backend::services::completion_service::{
    CompletionClient, CompletionError, CompletionRequest, CompletionResponse,
};
use quiz_backend::services::generator::GeneratorSettings;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
enum Behavior {
    UniqueItems,
    RateLimitedFirst(usize),
    NoJson,
}

/// Completion client that answers from a fixed script and counts its calls.
pub struct StubClient {
    behavior: Behavior,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl StubClient {
    fn with(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every call yields a well-formed item whose wording shares nothing with other calls.
    pub fn unique_items() -> Self {
        Self::with(Behavior::UniqueItems)
    }

    /// The first `n` calls are rejected with HTTP 429, later calls behave like `unique_items`.
    pub fn rate_limited_first(n: usize) -> Self {
        Self::with(Behavior::RateLimitedFirst(n))
    }

    pub fn no_json() -> Self {
        Self::with(Behavior::NoJson)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

pub fn unique_payload(n: usize) -> String {
    format!(
        r#"Here you go:
```json
{{"question": "Zeta{n}one zeta{n}two zeta{n}three zeta{n}four?", "correctAnswer": "Right{n}", "wrongAnswer1": "WrongA{n}", "wrongAnswer2": "WrongB{n}", "wrongAnswer3": "WrongC{n}"}}
```"#
    )
}

#[async_trait]
impl CompletionClient for StubClient {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());
        match self.behavior {
            Behavior::NoJson => Ok(CompletionResponse::text(
                "I'm sorry, I can only answer in prose today.",
            )),
            Behavior::RateLimitedFirst(k) if n < k => {
                Err(CompletionError::RateLimited { retry_after: None })
            }
            _ => Ok(CompletionResponse::text(unique_payload(n))),
        }
    }
}

/// Default timings without the pauses between waves.
pub fn fast_settings() -> GeneratorSettings {
    GeneratorSettings {
        wave_delay: Duration::ZERO,
        wave_jitter: Duration::ZERO,
        ..GeneratorSettings::default()
    }
}
