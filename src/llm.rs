//! Language-model service boundary.
//!
//! The pipeline talks to the model through the [`LanguageModel`] trait:
//! one forced function call for intent extraction, one embedding per run,
//! and one streamed generation. [`AzureOpenAiClient`] implements it against
//! an Azure OpenAI resource:
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | `call_function` | `POST /openai/responses` with `tool_choice` forcing the function |
//! | `embed` | `POST /openai/deployments/{embedding}/embeddings` |
//! | `stream_text` | `POST /openai/responses` with `stream: true` (SSE) |
//!
//! No retries happen here. A failed call surfaces as a [`ServiceError`] and
//! the calling stage decides what it means for the run.

use async_trait::async_trait;
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{require_secret, OpenAiConfig, OPENAI_KEY_VAR};
use crate::error::{DeweyError, ServiceError};
use crate::models::ConversationTurn;
use crate::sse::TextDeltaStream;

/// Ordered text fragments of one generation, ending at end-of-stream.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ServiceError>> + Send>>;

/// A forced function-call request.
#[derive(Debug, Clone, Copy)]
pub struct FunctionCall<'a> {
    pub instructions: &'a str,
    pub messages: &'a [ConversationTurn],
    /// Full tool definition (`{"type": "function", "name": ..., "parameters": ...}`).
    pub tool: &'a Value,
    pub function_name: &'a str,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Invoke the model with the function forced. Returns the raw JSON
    /// arguments of the call, or `None` when the model produced no call.
    async fn call_function(&self, call: FunctionCall<'_>) -> Result<Option<String>, ServiceError>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError>;

    /// Open a streamed generation.
    async fn stream_text(
        &self,
        instructions: &str,
        messages: &[ConversationTurn],
    ) -> Result<TextStream, ServiceError>;
}

/// [`LanguageModel`] backed by an Azure OpenAI resource.
#[derive(Clone)]
pub struct AzureOpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    api_version: String,
    chat_deployment: String,
    embedding_deployment: String,
    timeout: Duration,
}

impl AzureOpenAiClient {
    pub fn new(config: &OpenAiConfig, api_key: impl Into<String>) -> Result<Self, DeweyError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(DeweyError::Configuration(
                "Azure OpenAI API key must not be empty".into(),
            ));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DeweyError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
            api_version: config.api_version.clone(),
            chat_deployment: config.chat_deployment.clone(),
            embedding_deployment: config.embedding_deployment.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Build a client with the key from `AZURE_OPENAI_API_KEY`.
    pub fn from_env(config: &OpenAiConfig) -> Result<Self, DeweyError> {
        let key = require_secret(OPENAI_KEY_VAR)?;
        Self::new(config, key)
    }

    fn responses_url(&self) -> String {
        format!(
            "{}/openai/responses?api-version={}",
            self.endpoint, self.api_version
        )
    }

    fn embeddings_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/embeddings?api-version={}",
            self.endpoint, self.embedding_deployment, self.api_version
        )
    }

    async fn post(&self, url: String, body: &Value) -> Result<reqwest::Response, ServiceError> {
        let response = self
            .http
            .post(url)
            .header("api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Azure OpenAI request failed");
                ServiceError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %body_text, "Azure OpenAI API error");
            return Err(ServiceError::Api(format!("{}: {}", status, body_text)));
        }
        Ok(response)
    }
}

#[derive(Debug, Deserialize)]
struct ResponsesOutput {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Arguments of the last `function_call` output item naming `function_name`.
fn function_arguments(output: ResponsesOutput, function_name: &str) -> Option<String> {
    output
        .output
        .into_iter()
        .filter(|item| item.kind == "function_call")
        .filter(|item| item.name.as_deref() == Some(function_name))
        .filter_map(|item| item.arguments)
        .last()
}

#[async_trait]
impl LanguageModel for AzureOpenAiClient {
    async fn call_function(&self, call: FunctionCall<'_>) -> Result<Option<String>, ServiceError> {
        let body = json!({
            "model": self.chat_deployment,
            "instructions": call.instructions,
            "input": call.messages,
            "tools": [call.tool],
            "tool_choice": { "type": "function", "name": call.function_name },
        });

        let start = std::time::Instant::now();
        let response = tokio::time::timeout(self.timeout, async {
            let response = self.post(self.responses_url(), &body).await?;
            Ok::<_, ServiceError>(response.json::<ResponsesOutput>().await?)
        })
        .await
        .map_err(|_| ServiceError::Network("function call timed out".to_string()))??;

        debug!(
            deployment = %self.chat_deployment,
            duration_ms = start.elapsed().as_millis(),
            "Azure OpenAI function call"
        );

        Ok(function_arguments(response, call.function_name))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let body = json!({ "input": text });

        let parsed = tokio::time::timeout(self.timeout, async {
            let response = self.post(self.embeddings_url(), &body).await?;
            Ok::<_, ServiceError>(response.json::<EmbeddingResponse>().await?)
        })
        .await
        .map_err(|_| ServiceError::Network("embedding request timed out".to_string()))??;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ServiceError::Parse("embedding response had no vector".to_string()))
    }

    async fn stream_text(
        &self,
        instructions: &str,
        messages: &[ConversationTurn],
    ) -> Result<TextStream, ServiceError> {
        let body = json!({
            "model": self.chat_deployment,
            "instructions": instructions,
            "input": messages,
            "stream": true,
        });

        let response = tokio::time::timeout(self.timeout, self.post(self.responses_url(), &body))
            .await
            .map_err(|_| ServiceError::Network("generation request timed out".to_string()))??;

        Ok(Box::pin(
            TextDeltaStream::new(response.bytes_stream()).idle_timeout(self.timeout),
        ))
    }
}
