//! Ollama `/api/chat` streaming client.

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use cartwise_core::config::GenerationConfig;

use super::{GenerationEngine, GenerationOptions, PromptMessage, TokenStream};
use crate::error::ChatError;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    stream: bool,
    options: RequestOptions,
}

#[derive(Serialize)]
struct RequestOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct Chunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

enum Line {
    Token(String),
    Skip,
    Done(String),
    Failed(ChatError),
}

/// [`GenerationEngine`] backed by an Ollama-compatible HTTP server.
#[derive(Clone, Debug)]
pub struct OllamaEngine {
    client: reqwest::Client,
    endpoint: String,
}

impl OllamaEngine {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(config.endpoint.clone())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl GenerationEngine for OllamaEngine {
    async fn generate(
        &self,
        messages: Vec<PromptMessage>,
        options: &GenerationOptions,
    ) -> Result<TokenStream, ChatError> {
        let url = format!("{}/api/chat", self.endpoint);
        let body = ChatRequest {
            model: &options.model,
            messages: &messages,
            stream: true,
            options: RequestOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };
        debug!(%url, model = %options.model, messages = messages.len(), "Ollama request");

        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(ChatError::Generation(format!("HTTP {}: {}", status, detail.trim())));
        }

        let mut bytes = resp.bytes_stream();
        let out = stream! {
            let mut pending: Vec<u8> = Vec::new();
            let mut finished = false;

            'read: while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(b) => pending.extend_from_slice(&b),
                    Err(e) => {
                        yield Err(ChatError::Generation(e.to_string()));
                        finished = true;
                        break 'read;
                    }
                }

                // Lines may span chunk boundaries; only parse complete ones.
                while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=pos).collect();
                    match parse_line(&line) {
                        Line::Token(token) => {
                            yield Ok(token);
                        }
                        Line::Skip => {}
                        Line::Done(last) => {
                            if !last.is_empty() {
                                yield Ok(last);
                            }
                            finished = true;
                            break 'read;
                        }
                        Line::Failed(e) => {
                            yield Err(e);
                            finished = true;
                            break 'read;
                        }
                    }
                }
            }

            if !finished {
                match parse_line(&pending) {
                    Line::Done(last) => {
                        if !last.is_empty() {
                            yield Ok(last);
                        }
                    }
                    Line::Failed(e) => {
                        yield Err(e);
                    }
                    Line::Token(_) | Line::Skip => {
                        yield Err(ChatError::Generation(
                            "stream ended before completion".to_string(),
                        ));
                    }
                }
            }
            trace!("Ollama stream closed");
        };

        Ok(out.boxed())
    }
}

fn parse_line(line: &[u8]) -> Line {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return Line::Skip;
    }

    let chunk: Chunk = match serde_json::from_str(text) {
        Ok(chunk) => chunk,
        Err(e) => {
            return Line::Failed(ChatError::Generation(format!("invalid stream chunk: {}", e)))
        }
    };
    if let Some(error) = chunk.error {
        return Line::Failed(ChatError::Generation(error));
    }

    let content = chunk.message.map(|m| m.content).unwrap_or_default();
    if chunk.done {
        Line::Done(content)
    } else if content.is_empty() {
        Line::Skip
    } else {
        Line::Token(content)
    }
}
