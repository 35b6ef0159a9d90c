//! Anthropic-backed worker implementation.
//!
//! Wraps the Anthropic messages API behind the `Worker` trait: the task
//! payload becomes a single user message and the concatenated text blocks of
//! the response become the task result. Each worker owns a circuit breaker
//! around the HTTP call, so a repeatedly failing API stops being hit for the
//! cooldown period instead of burning task retries on doomed requests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::breaker::{BreakerConfig, CircuitBreaker};
use crate::error::{DispatchrError, Result};
use crate::worker::Worker;

/// Anthropic API base URL
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default model to use
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default max tokens
const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Configuration for an LLM worker
#[derive(Debug, Clone)]
pub struct LlmWorkerConfig {
    pub model: String,
    pub max_tokens: u32,
    /// System prompt framing this worker's specialty, if any
    pub system_prompt: Option<String>,
    /// HTTP timeout for one API call
    pub timeout: Duration,
    /// Breaker guarding the API call
    pub breaker: BreakerConfig,
}

impl Default for LlmWorkerConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: None,
            timeout: Duration::from_secs(300),
            breaker: BreakerConfig {
                failure_threshold: 5,
                reset_timeout: Duration::from_secs(60),
                half_open_requests: 3,
            },
        }
    }
}

impl LlmWorkerConfig {
    /// Create a config with a specific model
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Set the system prompt
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// Worker backed by the Anthropic messages API
pub struct LlmWorker {
    client: Client,
    api_key: String,
    config: LlmWorkerConfig,
    breaker: CircuitBreaker,
}

impl LlmWorker {
    /// Create a new LLM worker
    ///
    /// Reads ANTHROPIC_API_KEY from environment
    pub fn new(config: LlmWorkerConfig) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| DispatchrError::Llm("ANTHROPIC_API_KEY not set".to_string()))?;

        Self::with_api_key(api_key, config)
    }

    /// Create a worker with an explicit API key
    pub fn with_api_key(api_key: String, config: LlmWorkerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DispatchrError::Llm(format!("Failed to create HTTP client: {}", e)))?;

        let breaker = CircuitBreaker::new(config.breaker.clone());

        Ok(Self {
            client,
            api_key,
            config,
            breaker,
        })
    }

    /// Breaker guarding this worker's API calls.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Build the request body for the Anthropic API
    fn build_request(&self, payload: &str) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": [{
                "role": "user",
                "content": payload,
            }],
        });

        if let Some(ref system) = self.config.system_prompt {
            body["system"] = json!(system);
        }

        body
    }

    async fn send(&self, payload: &str) -> Result<String> {
        let body = self.build_request(payload);

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| DispatchrError::Llm(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(DispatchrError::Llm(format!(
                "API returned {}: {}",
                status, detail
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| DispatchrError::Llm(format!("Invalid response body: {}", e)))?;

        parse_response(&json)
    }
}

/// Extract the concatenated text blocks from a messages API response.
fn parse_response(body: &Value) -> Result<String> {
    let blocks = body["content"]
        .as_array()
        .ok_or_else(|| DispatchrError::Llm("Response missing content array".to_string()))?;

    let text: String = blocks
        .iter()
        .filter(|b| b["type"] == "text")
        .filter_map(|b| b["text"].as_str())
        .collect::<Vec<_>>()
        .join("\n");

    if text.is_empty() {
        return Err(DispatchrError::Llm(
            "Response contained no text blocks".to_string(),
        ));
    }

    Ok(text)
}

#[async_trait]
impl Worker for LlmWorker {
    async fn execute(&self, payload: &str) -> Result<String> {
        tracing::debug!(model = %self.config.model, bytes = payload.len(), "LLM worker call");
        self.breaker.call(self.send(payload)).await
    }
}
