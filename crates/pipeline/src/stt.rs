//! Speech-to-text collaborator
//!
//! The production client posts the captured clip to the transcription
//! sidecar and reads `{"text": ...}` back. Audio bytes are opaque here;
//! the sidecar sniffs the container format.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::PipelineError;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe one finished utterance
    async fn transcribe(&self, audio: &[u8]) -> Result<String, PipelineError>;

    /// Reachability probe for health reporting
    async fn is_available(&self) -> bool {
        true
    }
}

/// HTTP client for the transcription sidecar
pub struct HttpSttClient {
    url: String,
    client: Client,
}

impl HttpSttClient {
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

    fn transcribe_url(&self) -> String {
        format!("{}/api/transcribe", self.url)
    }
}

#[async_trait]
impl SpeechToText for HttpSttClient {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, PipelineError> {
        let response = self
            .client
            .post(self.transcribe_url())
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| PipelineError::Stt(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Stt(format!("sidecar returned {}", status)));
        }

        let body: TranscribeResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Stt(format!("bad response body: {}", e)))?;
        Ok(body.text)
    }

    async fn is_available(&self) -> bool {
        // Any HTTP answer proves the sidecar process is listening.
        self.client
            .get(&self.url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .is_ok()
    }
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    text: String,
}
