use anyhow::{anyhow, Result};
use async_openai::{
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
    },
    config::OpenAIConfig,
    Client as OpenAiClient,
};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Configuration for the LLM client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub requests_per_minute: u32,
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            model: "gpt-4-turbo".to_string(),
            max_tokens: 500,
            temperature: 0.1,
            requests_per_minute: 10,
            timeout_seconds: 30,
            max_retries: 3,
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAI,
}

/// Response from the LLM with metadata
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub raw_response: String,
    pub model: String,
    pub tokens_used: Option<u32>,
    pub provider: LlmProvider,
}

/// Opaque text generation: prompt in, answer text out
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<LlmResponse>;
}

/// LLM client with rate limiting and retry logic
pub struct LlmClient {
    openai_client: Option<OpenAiClient<OpenAIConfig>>,
    rate_limiter: Arc<RateLimiter<governor::state::direct::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>>,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig, api_key: String) -> Result<Self> {
        tracing::info!(
            "Initializing LLM client: provider={:?}, model={}, rate_limit={}/min",
            config.provider,
            config.model,
            config.requests_per_minute
        );

        if config.max_retries == 0 {
            return Err(anyhow!("max_retries must be > 0"));
        }

        let openai_client = match config.provider {
            LlmProvider::OpenAI => Some(OpenAiClient::with_config(
                OpenAIConfig::new().with_api_key(api_key),
            )),
        };

        let requests_per_minute = NonZeroU32::new(config.requests_per_minute)
            .ok_or_else(|| anyhow!("requests_per_minute must be > 0"))?;

        let quota = Quota::per_minute(requests_per_minute);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            openai_client,
            rate_limiter,
            config,
        })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Rate-limited call with exponential backoff between attempts
    pub async fn generate_answer(&self, prompt: &str) -> Result<LlmResponse> {
        self.rate_limiter.until_ready().await;

        tracing::debug!("Sending prompt to LLM (length: {} chars)", prompt.len());

        let mut last_error = None;

        for attempt in 0..self.config.max_retries {
            match self.call_llm(prompt).await {
                Ok(response) => {
                    tracing::info!(
                        "LLM response received: model={}, tokens={:?}, length={} chars",
                        response.model,
                        response.tokens_used,
                        response.raw_response.len()
                    );
                    return Ok(response);
                }
                Err(e) => {
                    if attempt + 1 < self.config.max_retries {
                        let backoff_ms = 2_u64.pow(attempt) * 1000;
                        tracing::warn!(
                            "LLM call failed (attempt {}/{}), retrying in {}ms: {}",
                            attempt + 1,
                            self.config.max_retries,
                            backoff_ms,
                            e
                        );
                        sleep(Duration::from_millis(backoff_ms)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("All retry attempts failed")))
    }

    async fn call_llm(&self, prompt: &str) -> Result<LlmResponse> {
        match self.config.provider {
            LlmProvider::OpenAI => self.call_openai(prompt).await,
        }
    }

    async fn call_openai(&self, prompt: &str) -> Result<LlmResponse> {
        let client = self
            .openai_client
            .as_ref()
            .ok_or_else(|| anyhow!("OpenAI client not initialized"))?;

        let request = CreateChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage {
                    content: ChatCompletionRequestUserMessageContent::Text(prompt.to_string()),
                    name: None,
                },
            )],
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
            ..Default::default()
        };

        let response = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_seconds),
            client.chat().create(request),
        )
        .await
        .map_err(|_| anyhow!("LLM request timed out after {}s", self.config.timeout_seconds))?
        .map_err(|e| anyhow!("OpenAI API error: {}", e))?;

        let response_text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| anyhow!("Empty response from LLM"))?;

        Ok(LlmResponse {
            raw_response: response_text,
            model: response.model.clone(),
            tokens_used: response.usage.map(|u| u.total_tokens),
            provider: LlmProvider::OpenAI,
        })
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, prompt: &str) -> Result<LlmResponse> {
        self.generate_answer(prompt).await
    }
}
