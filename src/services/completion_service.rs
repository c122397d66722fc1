use crate::models::item::Difficulty;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use thiserror::Error;

const MAX_HEADER_DELAY: Duration = Duration::from_secs(60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

impl SamplingParams {
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        let (temperature, top_p, max_tokens) = match difficulty {
            Difficulty::Easy => (0.7, 0.9, 600),
            Difficulty::Medium => (0.75, 0.92, 650),
            Difficulty::Hard => (0.8, 0.93, 700),
            Difficulty::Expert => (0.9, 0.95, 800),
        };
        Self {
            temperature,
            top_p,
            max_tokens,
            frequency_penalty: 0.3,
            presence_penalty: 0.2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub sampling: SamplingParams,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionResponse {
    pub content: Option<String>,
    pub finish_reason: Option<String>,
    pub error: Option<String>,
}

impl CompletionResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            finish_reason: Some("stop".to_string()),
            error: None,
        }
    }

    /// Message text, or the reason the 2xx body is unusable.
    pub fn into_text(self) -> Result<String, CompletionError> {
        if let Some(error) = self.error {
            return Err(CompletionError::Api(error));
        }
        if self.finish_reason.as_deref() == Some("length") {
            return Err(CompletionError::Truncated);
        }
        match self.content {
            Some(content) if !content.trim().is_empty() => Ok(content),
            _ => Err(CompletionError::EmptyBody),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryDelays {
    pub rate_limit: Duration,
    pub server_error: Duration,
    pub client_error: Duration,
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Rate limited by completion API (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Completion API error {status}: {message}")]
    Http {
        status: u16,
        retry_after: Option<Duration>,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Completion payload reported an error: {0}")]
    Api(String),

    #[error("Completion returned an empty message")]
    EmptyBody,

    #[error("Completion was cut off by the token limit")]
    Truncated,
}

impl CompletionError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, CompletionError::RateLimited { .. })
    }

    /// Authentication and permission failures will not improve on retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            CompletionError::Http {
                status: 401 | 403,
                ..
            }
        )
    }

    pub fn retry_delay(&self, delays: &RetryDelays) -> Duration {
        match self {
            CompletionError::RateLimited { retry_after } => retry_after.unwrap_or(delays.rate_limit),
            CompletionError::Http {
                status,
                retry_after,
                ..
            } => retry_after.unwrap_or(if *status >= 500 {
                delays.server_error
            } else {
                delays.client_error
            }),
            CompletionError::Network(_) => delays.server_error,
            CompletionError::Api(_) | CompletionError::EmptyBody | CompletionError::Truncated => {
                Duration::ZERO
            }
        }
    }
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError>;
}

#[derive(Clone)]
pub struct OpenAiCompletionService {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiCompletionService {
    pub fn new(api_key: String, base_url: String, model: String, client: Client) -> Self {
        Self {
            client,
            api_key,
            base_url,
            model,
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletionService {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        let payload = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.prompt}
            ],
            "temperature": request.sampling.temperature,
            "top_p": request.sampling.top_p,
            "max_tokens": request.sampling.max_tokens,
            "frequency_penalty": request.sampling.frequency_penalty,
            "presence_penalty": request.sampling.presence_penalty,
        });

        let res = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        let status = res.status();
        if status.as_u16() == 429 {
            return Err(CompletionError::RateLimited {
                retry_after: delay_from_headers(res.headers(), Utc::now()),
            });
        }
        if !status.is_success() {
            let retry_after = delay_from_headers(res.headers(), Utc::now());
            let text = res.text().await.unwrap_or_default();
            return Err(CompletionError::Http {
                status: status.as_u16(),
                retry_after,
                message: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let body: JsonValue = res
            .json()
            .await
            .map_err(|e| CompletionError::Api(format!("unreadable completion body: {}", e)))?;
        Ok(response_from_body(&body))
    }
}

pub fn response_from_body(body: &JsonValue) -> CompletionResponse {
    let error = body.get("error").and_then(|e| {
        if e.is_null() {
            None
        } else {
            Some(
                e.get("message")
                    .and_then(|m| m.as_str())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.to_string()),
            )
        }
    });
    let choice = body.get("choices").and_then(|c| c.get(0));
    let content = choice
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string());
    let finish_reason = choice
        .and_then(|c| c.get("finish_reason"))
        .and_then(|f| f.as_str())
        .map(|s| s.to_string());

    CompletionResponse {
        content,
        finish_reason,
        error,
    }
}

// Retry-After, then retry-after-ms, then x-ratelimit-reset-*. Capped at MAX_HEADER_DELAY.
pub fn delay_from_headers(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let delay = header("retry-after")
        .and_then(|v| parse_retry_after(v, now))
        .or_else(|| {
            header("retry-after-ms")
                .and_then(|v| v.trim().parse::<f64>().ok())
                .and_then(|ms| secs_to_duration(ms / 1000.0))
        })
        .or_else(|| header("x-ratelimit-reset-requests").and_then(parse_reset_duration))
        .or_else(|| header("x-ratelimit-reset-tokens").and_then(parse_reset_duration))?;

    Some(delay.min(MAX_HEADER_DELAY))
}

pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<f64>() {
        return secs_to_duration(secs);
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

pub fn parse_reset_duration(value: &str) -> Option<Duration> {
    let mut rest = value.trim();
    if rest.is_empty() {
        return None;
    }
    let mut total = 0f64;
    while !rest.is_empty() {
        let split = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(split);
        let amount: f64 = number.parse().ok()?;
        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_len);
        total += match unit {
            "ms" => amount / 1000.0,
            "s" => amount,
            "m" => amount * 60.0,
            "h" => amount * 3600.0,
            _ => return None,
        };
        rest = next;
    }
    secs_to_duration(total)
}

fn secs_to_duration(secs: f64) -> Option<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    // values past the representable range saturate; callers cap the result
    Some(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
}
