//! OpenAI chat-completions client
//!
//! One system message plus one user message per call; no conversation state
//! is carried between calls.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ChatClient, ChatRequest, LlmError};
use crate::config::LlmConfig;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Default wait when a 429 carries no usable retry-after header
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// OpenAI API client
pub struct OpenAIClient {
    model: String,
    base_url: String,
    system_prompt: String,
    max_retries: u32,
    http: Client,
}

impl OpenAIClient {
    /// Create a new client from configuration
    ///
    /// The credential is not part of the client; every request carries its own.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, base_url = %config.base_url, "from_config: called");
        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            system_prompt: config.system_prompt.clone(),
            max_retries: config.max_retries,
            http,
        })
    }

    /// Default model used when a request names none
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build the request body for the chat-completions endpoint
    fn build_request_body(&self, request: &ChatRequest) -> serde_json::Value {
        let model = request.model.as_deref().filter(|m| !m.is_empty()).unwrap_or(&self.model);
        debug!(%model, "build_request_body: called");

        serde_json::json!({
            "model": model,
            "messages": [
                { "role": "system", "content": self.system_prompt },
                { "role": "user", "content": request.prompt },
            ],
        })
    }

    /// Turn a non-2xx response body into a readable message
    fn error_message(status: u16, body: &str) -> String {
        serde_json::from_str::<OpenAIErrorBody>(body)
            .ok()
            .and_then(|b| b.error)
            .and_then(|e| e.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("HTTP error: {}", status))
    }

    /// Pull the reply text out of a successful response
    fn parse_reply(api_response: OpenAIResponse) -> Result<String, LlmError> {
        debug!(choice_count = %api_response.choices.len(), "parse_reply: called");
        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("No reply content in response".to_string()))
    }
}

#[async_trait]
impl ChatClient for OpenAIClient {
    async fn chat(&self, request: ChatRequest) -> Result<String, LlmError> {
        debug!(?request, "chat: called");
        if request.api_key.trim().is_empty() {
            debug!("chat: no api key");
            return Err(LlmError::MissingApiKey);
        }
        if request.prompt.trim().is_empty() {
            debug!("chat: empty prompt");
            return Err(LlmError::EmptyPrompt);
        }

        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_request_body(&request);

        let mut attempt = 0;
        loop {
            let err = match self.send_once(&url, request.api_key.trim(), &body).await {
                Ok(reply) => return Ok(reply),
                Err(e) => e,
            };

            if !err.is_retryable() || attempt >= self.max_retries {
                debug!(attempt, status = ?err.status(), error = %err, "chat: giving up");
                return Err(err);
            }

            let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
            let wait = err.retry_after().unwrap_or(backoff);
            attempt += 1;
            warn!(
                attempt,
                rate_limited = err.is_rate_limit(),
                wait_ms = wait.as_millis() as u64,
                "chat: retrying after transient error"
            );
            tokio::time::sleep(wait).await;
        }
    }
}

impl OpenAIClient {
    /// One POST to the chat-completions endpoint
    async fn send_once(&self, url: &str, api_key: &str, body: &serde_json::Value) -> Result<String, LlmError> {
        let response = self
            .http
            .post(url)
            .bearer_auth(api_key)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status().as_u16();

        if status == 429 {
            debug!("send_once: rate limited (429)");
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);

            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = Self::error_message(status, &text);
            debug!(%status, %message, "send_once: API error");
            return Err(LlmError::ApiError { status, message });
        }

        debug!("send_once: success");
        let text = response.text().await?;
        let api_response: OpenAIResponse = serde_json::from_str(&text)?;
        Self::parse_reply(api_response)
    }
}

// OpenAI API response types

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorBody {
    error: Option<OpenAIErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorDetail {
    message: Option<String>,
}
