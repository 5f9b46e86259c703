//! Remote provider backend (OpenAI-compatible chat completions)
//!
//! Single-shot: one authenticated `POST` per generation, reply read from
//! `choices[0].message.content`. No streaming; when an observer channel is
//! supplied it receives the full text once.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use samvad_core::Message;

use crate::backend::{FinishReason, GenerationResult, ModelBackend};
use crate::LlmError;

/// Backend bound to one remote provider and model
pub struct RemoteBackend {
    provider: String,
    model: String,
    endpoint: String,
    api_key: String,
    timeout: Duration,
    client: Client,
}

impl RemoteBackend {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout_ms: u64,
        client: Client,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            timeout: Duration::from_millis(timeout_ms),
            client,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    fn provider_response(&self, status: u16) -> LlmError {
        LlmError::ProviderResponse {
            provider: self.provider.clone(),
            status,
        }
    }
}

#[async_trait]
impl ModelBackend for RemoteBackend {
    async fn generate(
        &self,
        messages: &[Message],
        fragments: Option<mpsc::Sender<String>>,
    ) -> Result<GenerationResult, LlmError> {
        let started = Instant::now();
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.provider_response(status.as_u16()));
        }

        // A 2xx body that does not carry the reply field is a provider
        // fault, same as a bad status. Never turn it into an empty reply.
        let body = response.text().await?;
        let completion: ChatCompletionResponse =
            serde_json::from_str(&body).map_err(|_| self.provider_response(status.as_u16()))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| self.provider_response(status.as_u16()))?;
        let finish_reason = match choice.finish_reason.as_deref() {
            Some("length") => FinishReason::Length,
            _ => FinishReason::Stop,
        };
        let text = choice
            .message
            .and_then(|m| m.content)
            .ok_or_else(|| self.provider_response(status.as_u16()))?;

        if let Some(tx) = fragments {
            // Single shot: the whole reply is one fragment. A dropped
            // receiver is not an error at this point.
            let _ = tx.send(text.clone()).await;
        }

        let tokens = completion
            .usage
            .map(|u| u.completion_tokens)
            .unwrap_or_default();

        Ok(GenerationResult {
            text,
            model: self.model.clone(),
            tokens,
            time_to_first_token_ms: None,
            total_time_ms: started.elapsed().as_millis() as u64,
            finish_reason,
        })
    }

    async fn is_available(&self) -> bool {
        // No portable liveness endpoint across providers; a configured
        // credential is the best static signal.
        !self.api_key.is_empty()
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ---- Wire types ----

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatChoiceMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    completion_tokens: usize,
}
