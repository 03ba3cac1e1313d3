//! Language-model handles.
//!
//! Models are addressed with LiteLLM-style identifiers (`provider/name`) and
//! spoken to over an OpenAI-compatible chat-completions API.

pub mod litellm;

pub use litellm::LiteModel;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{KgserveError, Result};

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a completion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Shape the completion should take
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseFormat {
    #[default]
    Text,
    Json,
}

/// Anything that can answer a chat-completion request
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Identifier the handle was built with
    fn model_name(&self) -> &str;

    /// Complete `messages`, returning the assistant's reply text
    async fn complete(&self, messages: &[ChatMessage], format: ResponseFormat) -> Result<String>;
}

/// LiteLLM-style model identifier, `provider/name` or a bare `name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelId {
    provider: Option<String>,
    name: String,
}

impl ModelId {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.split_once('/') {
            Some((provider, name)) if !provider.is_empty() && !name.is_empty() => Self {
                provider: Some(provider.to_string()),
                name: name.to_string(),
            },
            _ => Self { provider: None, name: raw.to_string() },
        }
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Model string sent on the wire.
    ///
    /// `openai/` is a routing prefix only, OpenAI itself expects the bare
    /// name. Other providers are kept whole for a LiteLLM proxy to route.
    pub fn wire_name(&self) -> String {
        match self.provider.as_deref() {
            None | Some("openai") => self.name.clone(),
            Some(provider) => format!("{}/{}", provider, self.name),
        }
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.provider {
            Some(provider) => write!(f, "{}/{}", provider, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Parse a JSON object out of a model reply.
///
/// Models wrap JSON in markdown fences or prose often enough that the reply
/// is cut down to its outermost `{...}` before deserializing.
pub fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> Result<T> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let body = match (start, end) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => {
            return Err(KgserveError::Model(format!(
                "expected a JSON object in model reply, got: {}",
                truncate_for_log(reply)
            )))
        }
    };
    serde_json::from_str(body).map_err(|e| {
        KgserveError::Model(format!("invalid JSON in model reply ({}): {}", e, truncate_for_log(reply)))
    })
}

fn truncate_for_log(text: &str) -> String {
    const MAX: usize = 200;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(MAX).collect();
        cut.push('…');
        cut
    }
}
