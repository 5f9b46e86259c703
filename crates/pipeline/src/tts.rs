//! Text-to-speech collaborator
//!
//! Posts `{"text": ...}` to the synthesis sidecar; the response body is the
//! rendered audio (WAV) verbatim.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::PipelineError;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Render the reply text to audio bytes
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, PipelineError>;

    /// Reachability probe for health reporting
    async fn is_available(&self) -> bool {
        true
    }
}

/// HTTP client for the synthesis sidecar
pub struct HttpTtsClient {
    url: String,
    client: Client,
}

impl HttpTtsClient {
    pub fn new(url: impl Into<String>, timeout_ms: u64) -> Self {
        let url: String = url.into();
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .unwrap_or_default();
        Self {
            url: url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn tts_url(&self) -> String {
        format!("{}/api/tts", self.url)
    }
}

#[async_trait]
impl TextToSpeech for HttpTtsClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, PipelineError> {
        let response = self
            .client
            .post(self.tts_url())
            .json(&TtsRequest { text })
            .send()
            .await
            .map_err(|e| PipelineError::Tts(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Tts(format!("sidecar returned {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::Tts(format!("body read failed: {}", e)))?;
        Ok(bytes.to_vec())
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(&self.url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .is_ok()
    }
}

#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
}
