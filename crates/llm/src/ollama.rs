//! Local runtime client and backend (Ollama)
//!
//! One client covers every endpoint the gateway touches: streaming chat,
//! the installed-model catalog, and long-running model pulls. The backend
//! wraps the client with a fixed model name.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use samvad_config::OllamaSettings;
use samvad_core::Message;

use crate::backend::{FinishReason, GenerationResult, ModelBackend};
use crate::LlmError;

const AVAILABILITY_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// HTTP client for the local Ollama runtime
#[derive(Debug, Clone)]
pub struct OllamaClient {
    endpoint: String,
    keep_alive: String,
    request_timeout: Duration,
    pull_timeout: Duration,
    client: Client,
}

impl OllamaClient {
    pub fn new(settings: &OllamaSettings) -> Self {
        let request_timeout = Duration::from_millis(settings.request_timeout_ms);
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();

        Self {
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            keep_alive: settings.keep_alive.clone(),
            request_timeout,
            pull_timeout: Duration::from_millis(settings.pull_timeout_ms),
            client,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.endpoint, path)
    }

    /// Run one streaming chat generation
    ///
    /// Reads the NDJSON stream from `POST /api/chat`, accumulating each
    /// chunk's `message.content` and forwarding it to the observer when one
    /// is supplied. A `done: true` chunk ends the stream; a closed observer
    /// channel cancels it and returns the partial text accumulated so far.
    pub async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        fragments: Option<mpsc::Sender<String>>,
    ) -> Result<GenerationResult, LlmError> {
        let started = Instant::now();
        let request = OllamaChatRequest {
            model,
            messages,
            stream: true,
            keep_alive: Some(&self.keep_alive),
        };

        let response = self
            .client
            .post(self.api_url("/chat"))
            .timeout(self.request_timeout)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Generation(format!(
                "Ollama chat returned {}",
                status
            )));
        }

        let mut stream = response.bytes_stream();
        let mut pending = String::new();
        let mut text = String::new();
        let mut fragment_count = 0usize;
        let mut first_fragment_ms = None;
        let mut cancelled = false;

        'read: while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| LlmError::Network(e.to_string()))?;
            pending.push_str(&String::from_utf8_lossy(&chunk));

            // A network chunk can end mid-line; keep the partial tail for
            // the next read.
            while let Some(pos) = pending.find('\n') {
                let line: String = pending.drain(..=pos).collect();
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let parsed: OllamaStreamChunk = match serde_json::from_str(line) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping malformed stream line");
                        continue;
                    }
                };

                if let Some(message) = parsed.message {
                    if !message.content.is_empty() {
                        if first_fragment_ms.is_none() {
                            first_fragment_ms = Some(started.elapsed().as_millis() as u64);
                        }
                        text.push_str(&message.content);
                        fragment_count += 1;

                        if let Some(tx) = fragments.as_ref() {
                            if tx.send(message.content).await.is_err() {
                                // Observer went away; the stream is not
                                // restartable, so stop reading here.
                                cancelled = true;
                                break 'read;
                            }
                        }
                    }
                }

                if parsed.done {
                    break 'read;
                }
            }
        }

        Ok(GenerationResult {
            text,
            model: model.to_string(),
            tokens: fragment_count,
            time_to_first_token_ms: first_fragment_ms,
            total_time_ms: started.elapsed().as_millis() as u64,
            finish_reason: if cancelled {
                FinishReason::Cancelled
            } else {
                FinishReason::Stop
            },
        })
    }

    /// List installed model names from `GET /api/tags`
    pub async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let response = self.client.get(self.api_url("/tags")).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Generation(format!(
                "Ollama tags returned {}",
                status
            )));
        }

        let tags: OllamaTagsResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Pull a model into the local runtime
    ///
    /// Long-running download; uses its own timeout, far above the chat one.
    pub async fn pull_model(&self, model: &str) -> Result<(), LlmError> {
        let request = OllamaPullRequest {
            name: model,
            stream: false,
        };

        let response = self
            .client
            .post(self.api_url("/pull"))
            .timeout(self.pull_timeout)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LlmError::ModelNotFound(model.to_string()));
        }
        Ok(())
    }

    /// Quick reachability probe
    pub async fn is_available(&self) -> bool {
        match self
            .client
            .get(self.api_url("/tags"))
            .timeout(AVAILABILITY_PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Backend bound to one local model
pub struct OllamaBackend {
    client: OllamaClient,
    model: String,
}

impl OllamaBackend {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ModelBackend for OllamaBackend {
    async fn generate(
        &self,
        messages: &[Message],
        fragments: Option<mpsc::Sender<String>>,
    ) -> Result<GenerationResult, LlmError> {
        self.client.chat(&self.model, messages, fragments).await
    }

    async fn is_available(&self) -> bool {
        self.client.is_available().await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ---- Wire types ----

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct OllamaPullRequest<'a> {
    name: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaStreamChunk {
    #[serde(default)]
    message: Option<OllamaStreamMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaStreamMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModelTag>,
}

#[derive(Debug, Deserialize)]
struct OllamaModelTag {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_building() {
        let mut settings = OllamaSettings::default();
        settings.endpoint = "http://localhost:11434/".to_string();
        let client = OllamaClient::new(&settings);
        assert_eq!(client.api_url("/chat"), "http://localhost:11434/api/chat");
        assert_eq!(client.api_url("/tags"), "http://localhost:11434/api/tags");
    }

    #[test]
    fn test_stream_chunk_parsing() {
        let line = r#"{"model":"llama3.2","message":{"role":"assistant","content":"Hel"},"done":false}"#;
        let parsed: OllamaStreamChunk = serde_json::from_str(line).unwrap();
        assert_eq!(parsed.message.unwrap().content, "Hel");
        assert!(!parsed.done);

        let final_line =
            r#"{"model":"llama3.2","message":{"role":"assistant","content":""},"done":true,"total_duration":4883583458}"#;
        let parsed: OllamaStreamChunk = serde_json::from_str(final_line).unwrap();
        assert!(parsed.done);
    }

    #[test]
    fn test_tags_parsing() {
        let body = r#"{"models":[{"name":"llama3.2:latest","size":2019393189},{"name":"qwen3:1.7b"}]}"#;
        let parsed: OllamaTagsResponse = serde_json::from_str(body).unwrap();
        let names: Vec<String> = parsed.models.into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["llama3.2:latest", "qwen3:1.7b"]);
    }

    #[test]
    fn test_chat_request_shape() {
        let messages = vec![Message::user("Hello")];
        let request = OllamaChatRequest {
            model: "llama3.2",
            messages: &messages,
            stream: true,
            keep_alive: Some("5m"),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "llama3.2");
        assert_eq!(value["stream"], true);
        assert_eq!(value["keep_alive"], "5m");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "Hello");
    }

    #[test]
    fn test_pull_request_shape() {
        let request = OllamaPullRequest {
            name: "qwen3:1.7b",
            stream: false,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["name"], "qwen3:1.7b");
        assert_eq!(value["stream"], false);
    }
}
