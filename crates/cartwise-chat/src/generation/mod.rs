//! Text generation seam.
//!
//! The coordinator only sees a [`GenerationEngine`] producing a
//! [`TokenStream`]: stream end means natural completion, an `Err` item
//! means the engine failed.

pub mod ollama;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use cartwise_core::config::GenerationConfig;
use cartwise_core::types::Role;

use crate::error::ChatError;

pub use ollama::OllamaEngine;

/// Fragments of generated text, in order.
pub type TokenStream = BoxStream<'static, Result<String, ChatError>>;

/// One message of a generation prompt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

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

/// Sampling parameters for one generation request.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&GenerationConfig> for GenerationOptions {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Produces a reply as a stream of text fragments.
#[async_trait]
pub trait GenerationEngine: Send + Sync {
    /// Start generating a reply to `messages`.
    ///
    /// Failing to start is reported here; failures after the first fragment
    /// arrive as `Err` items on the stream.
    async fn generate(
        &self,
        messages: Vec<PromptMessage>,
        options: &GenerationOptions,
    ) -> Result<TokenStream, ChatError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_message_serializes_lowercase_role() {
        let json = serde_json::to_value(PromptMessage::assistant("hi")).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "hi");
    }

    #[test]
    fn test_options_from_config() {
        let config = GenerationConfig::default();
        let options = GenerationOptions::from(&config);
        assert_eq!(options.model, config.model);
        assert_eq!(options.max_tokens, 1024);
    }
}
