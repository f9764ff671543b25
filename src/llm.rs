//! OpenAI-compatible chat and embedding clients.
//!
//! Both talk to any server exposing `/chat/completions` and `/embeddings`
//! under a base URL (OpenAI itself, or a compatible gateway).

use crate::error::{CitationsError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Inputs per embeddings request
const EMBEDDING_BATCH_SIZE: usize = 64;

/// Default cap on characters sent per embedding input
pub const DEFAULT_MAX_INPUT_CHARS: usize = 24_000;

/// LLM endpoint configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

/// Token usage tracking
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Something that answers a single prompt.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<(String, TokenUsage)>;
}

/// Something that turns texts into vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model name, recorded with persisted indexes
    fn model(&self) -> &str;

    /// One vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| CitationsError::Config(format!("Failed to build HTTP client: {}", e)))
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

/// POST a JSON body and map error statuses
async fn post_json(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    body: &serde_json::Value,
) -> Result<reqwest::Response> {
    let response = client
        .post(url)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {}", api_key))
        .json(body)
        .send()
        .await?;

    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(CitationsError::RateLimited(60));
    }
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(CitationsError::Api {
            code: status.as_u16() as i32,
            message: format!("LLM API error: {} - {}", status, error_text),
        });
    }

    Ok(response)
}

/// Chat-completions client
pub struct ChatClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl ChatClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            config,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl ChatModel for ChatClient {
    async fn complete(&self, prompt: &str) -> Result<(String, TokenUsage)> {
        // Reasoning models reject system messages and temperature, so only a
        // user message is sent.
        let request_body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "user", "content": prompt}
            ]
        });

        let url = endpoint(&self.config.base_url, "chat/completions");
        debug!(model = %self.config.model, "Sending chat request");

        let response = post_json(&self.client, &url, &self.config.api_key, &request_body).await?;
        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CitationsError::Parse(format!("Failed to parse LLM response: {}", e)))?;

        let usage = api_response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CitationsError::Parse("LLM response has no content".to_string()))?;

        Ok((content.trim().to_string(), usage))
    }
}

/// Embeddings client
pub struct EmbeddingClient {
    client: reqwest::Client,
    config: LlmConfig,
    max_input_chars: usize,
}

impl EmbeddingClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            config,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        })
    }

    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars.max(1);
        self
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let inputs: Vec<String> = batch
            .iter()
            .map(|t| t.chars().take(self.max_input_chars).collect())
            .collect();

        let request_body = serde_json::json!({
            "model": self.config.model,
            "input": inputs,
        });

        let url = endpoint(&self.config.base_url, "embeddings");
        let response = post_json(&self.client, &url, &self.config.api_key, &request_body).await?;
        let mut api_response: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| CitationsError::Parse(format!("Failed to parse embeddings: {}", e)))?;

        if api_response.data.len() != batch.len() {
            return Err(CitationsError::Parse(format!(
                "Expected {} embeddings, got {}",
                batch.len(),
                api_response.data.len()
            )));
        }

        api_response.data.sort_by_key(|d| d.index);
        Ok(api_response.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for (idx, batch) in texts.chunks(EMBEDDING_BATCH_SIZE).enumerate() {
            debug!(batch = idx, size = batch.len(), model = %self.config.model, "Embedding batch");
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }
}
