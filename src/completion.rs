//! The completion service boundary.
//!
//! [`CompletionProvider`] is the only seam through which a question leaves
//! the process. [`AnthropicProvider`] talks to the Anthropic Messages API;
//! tests substitute scripted providers. [`complete_with_retry`] wraps any
//! provider with the bounded rate-limit retry loop.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{Error, Result};

pub const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Everything the service needs to answer one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// System instruction, including the retrieved context.
    pub system: String,
    /// Prior turns followed by the new question as the last user turn.
    pub messages: Vec<Message>,
}

impl CompletionRequest {
    pub fn new(
        system: impl Into<String>,
        history: &[Message],
        question: &str,
    ) -> Self {
        let mut messages = history.to_vec();
        messages.push(Message::user(question));
        Self {
            system: system.into(),
            messages,
        }
    }
}

/// A backend that turns a request into answer text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Anthropic Messages API client.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: String,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Use a preconfigured HTTP client (timeouts, proxies).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn body(&self, request: &CompletionRequest) -> serde_json::Value {
        json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": request.system,
            "messages": request.messages,
        })
    }
}

/// Parse a `retry-after` header given in whole seconds.
fn parse_retry_after(
    value: Option<&reqwest::header::HeaderValue>,
) -> Option<Duration> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url =
            format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        tracing::debug!(
            %url,
            model = %self.model,
            "sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.body(request))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after =
                parse_retry_after(response.headers().get("retry-after"));
            let message = response.text().await.unwrap_or_default();
            return Err(Error::RateLimited {
                retry_after,
                message,
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!("{}: {body}", status.as_u16())));
        }

        let value: serde_json::Value = response.json().await?;
        value["content"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                Error::Upstream("response is missing content[0].text".into())
            })
    }
}

/// An awaitable delay, swappable for a recording one.
#[async_trait]
pub trait Sleep: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleep;

#[async_trait]
impl Sleep for TokioSleep {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Bounded retry on rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Wait used when the service gives no hint.
    pub default_delay: Duration,
    /// Upper bound on any single wait.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            default_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, hint: Option<Duration>) -> Duration {
        hint.unwrap_or(self.default_delay).min(self.max_delay)
    }
}

/// Call `provider`, retrying only on [`Error::RateLimited`].
///
/// At most `1 + policy.max_retries` attempts are made. Any other error, and
/// the rate-limit error of the last attempt, is returned unchanged.
pub async fn complete_with_retry(
    provider: &dyn CompletionProvider,
    request: &CompletionRequest,
    policy: &RetryPolicy,
    sleeper: &dyn Sleep,
) -> Result<String> {
    let mut attempt = 0;
    loop {
        match provider.complete(request).await {
            Err(Error::RateLimited { retry_after, .. })
                if attempt < policy.max_retries =>
            {
                attempt += 1;
                let delay = policy.delay_for(retry_after);
                tracing::warn!(
                    attempt,
                    max_retries = policy.max_retries,
                    delay_secs = delay.as_secs(),
                    "rate limited, retrying"
                );
                sleeper.sleep(delay).await;
            }
            other => return other,
        }
    }
}
