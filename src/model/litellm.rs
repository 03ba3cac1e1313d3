use crate::config::ModelConfig;
use crate::error::{KgserveError, Result};
use crate::model::{ChatMessage, LanguageModel, ModelId, ResponseFormat};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request structure for the chat-completions API
#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: String,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatSpec>,
}

#[derive(Serialize)]
struct ResponseFormatSpec {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Response structure from the chat-completions API
#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Model handle for OpenAI-compatible endpoints (OpenAI or a LiteLLM proxy)
///
/// Retries rate-limit and server errors with exponential backoff. No request
/// timeout is applied; ontology inference over long documents can take minutes.
pub struct LiteModel {
    client: Client,
    id: ModelId,
    raw_name: String,
    api_base: String,
    api_key: Option<String>,
    max_retries: usize,
    initial_backoff: Duration,
}

impl LiteModel {
    /// Create a model handle from configuration
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            id: ModelId::parse(&config.name),
            raw_name: config.name.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
            initial_backoff: Duration::from_secs(1),
        })
    }

    /// Override the first retry delay (doubles after each retry)
    pub fn with_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn id(&self) -> &ModelId {
        &self.id
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    fn build_request<'a>(&self, messages: &'a [ChatMessage], format: ResponseFormat) -> CompletionRequest<'a> {
        CompletionRequest {
            model: self.id.wire_name(),
            messages,
            temperature: 0.0,
            response_format: match format {
                ResponseFormat::Json => Some(ResponseFormatSpec { kind: "json_object" }),
                ResponseFormat::Text => None,
            },
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl LanguageModel for LiteModel {
    fn model_name(&self) -> &str {
        &self.raw_name
    }

    async fn complete(&self, messages: &[ChatMessage], format: ResponseFormat) -> Result<String> {
        let request = self.build_request(messages, format);
        let start = std::time::Instant::now();
        let mut attempt = 0;
        let mut delay = self.initial_backoff;

        loop {
            let mut builder = self.client.post(self.endpoint()).json(&request);
            if let Some(key) = &self.api_key {
                builder = builder.bearer_auth(key);
            }

            let response = builder.send().await?;
            let status = response.status();

            if status.is_success() {
                let result: CompletionResponse = response
                    .json()
                    .await
                    .map_err(|e| KgserveError::Model(format!("Failed to parse response: {}", e)))?;

                log::debug!(
                    "Completion from {} took {:?} (attempt {})",
                    self.id,
                    start.elapsed(),
                    attempt + 1
                );

                return result
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .ok_or_else(|| KgserveError::Model("Empty completion from model provider".to_string()));
            }

            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            if is_retryable(status) && attempt < self.max_retries {
                log::warn!(
                    "Retry {}/{} after model provider returned {}",
                    attempt + 1,
                    self.max_retries,
                    status
                );
                tokio::time::sleep(delay).await;
                delay *= 2; // Exponential backoff
                attempt += 1;
                continue;
            }

            return Err(KgserveError::Model(format!(
                "Model provider error {}: {}",
                status, body
            )));
        }
    }
}
