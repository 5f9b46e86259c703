//! Application State
//!
//! Shared state across all handlers.

use std::sync::Arc;

use samvad_config::{ConfigError, PersistenceBackend, Settings};
use samvad_core::{ModelId, ModelIdError};
use samvad_gateway::{ConversationGateway, VoiceCollaborators, VoicePipeline};
use samvad_llm::{BackendResolver, OllamaClient, ProviderRegistry};
use samvad_persistence::{HttpTranscriptStore, MemoryTranscriptStore, TranscriptStore};
use samvad_pipeline::{
    AudioCapture, BufferCapture, HttpSttClient, HttpTtsClient, NullSink, SpeechToText,
    TextToSpeech,
};

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    /// Text exchange entry point
    pub gateway: Arc<ConversationGateway>,
    /// Voice turn state machine
    pub voice: Arc<VoicePipeline>,
    /// Staging buffer the voice endpoint deposits request audio into
    pub capture: Arc<BufferCapture>,
    /// Local runtime client (catalog, pull, health probe)
    pub ollama: OllamaClient,
    pub stt: Arc<dyn SpeechToText>,
    pub tts: Arc<dyn TextToSpeech>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire the full stack from settings
    ///
    /// Fails when settings that passed file loading are still unusable for
    /// wiring: an `http` store without a URL, or an unparseable voice model.
    pub fn from_settings(config: Settings) -> Result<Self, ConfigError> {
        let config = Arc::new(config);

        let registry = Arc::new(ProviderRegistry::from_settings(&config));
        let ollama = registry.ollama().clone();

        let store: Arc<dyn TranscriptStore> = match config.persistence.backend {
            PersistenceBackend::Memory => Arc::new(MemoryTranscriptStore::new()),
            PersistenceBackend::Http => {
                let api_url = config
                    .persistence
                    .api_url
                    .clone()
                    .ok_or_else(|| ConfigError::MissingField("persistence.api_url".to_string()))?;
                Arc::new(HttpTranscriptStore::new(
                    api_url,
                    config.persistence.api_key.clone(),
                ))
            }
        };

        let gateway = Arc::new(ConversationGateway::new(
            registry as Arc<dyn BackendResolver>,
            store,
        ));

        let voice_model: ModelId =
            config
                .voice
                .model
                .parse()
                .map_err(|e: ModelIdError| ConfigError::InvalidValue {
                    field: "voice.model".to_string(),
                    message: e.to_string(),
                })?;

        let capture = Arc::new(BufferCapture::new());
        let stt: Arc<dyn SpeechToText> =
            Arc::new(HttpSttClient::new(&config.voice.stt_url, config.voice.timeout_ms));
        let tts: Arc<dyn TextToSpeech> =
            Arc::new(HttpTtsClient::new(&config.voice.tts_url, config.voice.timeout_ms));

        let voice = Arc::new(VoicePipeline::new(
            VoiceCollaborators {
                capture: capture.clone() as Arc<dyn AudioCapture>,
                stt: stt.clone(),
                tts: tts.clone(),
                sink: Arc::new(NullSink),
            },
            gateway.clone(),
            voice_model,
            config.voice.conversation_id.clone(),
        ));

        Ok(Self {
            config,
            gateway,
            voice,
            capture,
            ollama,
            stt,
            tts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_from_default_settings() {
        let state = AppState::from_settings(Settings::default()).unwrap();
        assert_eq!(state.config.server.port, 8080);
    }

    #[test]
    fn test_http_store_without_url_is_rejected() {
        let mut settings = Settings::default();
        settings.persistence.backend = PersistenceBackend::Http;
        settings.persistence.api_url = None;

        let err = AppState::from_settings(settings).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn test_malformed_voice_model_is_rejected() {
        let mut settings = Settings::default();
        settings.voice.model = "remote::".to_string();

        let err = AppState::from_settings(settings).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
