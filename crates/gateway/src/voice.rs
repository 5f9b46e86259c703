//! Push-to-talk voice pipeline
//!
//! One strict cycle per turn:
//!
//! ```text
//! Idle ──start──▶ Recording ──stop──▶ Transcribing ──▶ Generating
//!                                                          │
//!   ▲                                                      ▼
//!   └──────────── Playing ◀── Synthesizing ◀───────────────┘
//! ```
//!
//! Any failure after `Recording` lands in `Error`; `reset()` returns to
//! `Idle` from anywhere. The capture session is released on every path,
//! including errors and abandonment, because dropping it is the release.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};

use samvad_core::ModelId;
use samvad_pipeline::{AudioCapture, AudioSink, CaptureSession, SpeechToText, TextToSpeech};

use crate::gateway::{ConversationGateway, GatewayError};

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    /// Nothing in flight
    Idle,
    /// Capture session open, audio accumulating
    Recording,
    /// Clip handed to the STT collaborator
    Transcribing,
    /// Exchange running against the gateway
    Generating,
    /// Reply handed to the TTS collaborator
    Synthesizing,
    /// Synthesized audio playing
    Playing,
    /// A cycle failed; reset to continue
    Error,
}

/// Pipeline events, observable via `subscribe`
#[derive(Debug, Clone)]
pub enum VoiceEvent {
    StateChanged { old: VoiceState, new: VoiceState },
    Transcript { text: String },
    Reply { text: String },
    Failed { message: String },
}

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Audio capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    /// Synthesis broke after the exchange completed; the texts survive so
    /// the caller can still deliver the reply
    #[error("Synthesis failed: {message}")]
    SynthesisFailed {
        transcript: String,
        reply: String,
        message: String,
    },

    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    #[error("Cannot {action} while {from:?}")]
    IllegalTransition {
        from: VoiceState,
        action: &'static str,
    },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// One completed voice turn
#[derive(Debug)]
pub struct VoiceTurn {
    pub transcript: String,
    pub reply: String,
    /// Synthesized reply audio
    pub audio: Vec<u8>,
    /// Carried through from the exchange
    pub persistence_warning: Option<String>,
}

/// The four collaborator seams the pipeline drives
pub struct VoiceCollaborators {
    pub capture: Arc<dyn AudioCapture>,
    pub stt: Arc<dyn SpeechToText>,
    pub tts: Arc<dyn TextToSpeech>,
    pub sink: Arc<dyn AudioSink>,
}

/// Push-to-talk state machine over the conversation gateway
pub struct VoicePipeline {
    capture: Arc<dyn AudioCapture>,
    stt: Arc<dyn SpeechToText>,
    tts: Arc<dyn TextToSpeech>,
    sink: Arc<dyn AudioSink>,
    gateway: Arc<ConversationGateway>,
    model: ModelId,
    conversation_id: String,
    state: Arc<RwLock<VoiceState>>,
    /// Live capture session; also the operation lock for start/stop/reset
    session: Mutex<Option<Box<dyn CaptureSession>>>,
    event_tx: broadcast::Sender<VoiceEvent>,
}

impl VoicePipeline {
    pub fn new(
        collaborators: VoiceCollaborators,
        gateway: Arc<ConversationGateway>,
        model: ModelId,
        conversation_id: impl Into<String>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            capture: collaborators.capture,
            stt: collaborators.stt,
            tts: collaborators.tts,
            sink: collaborators.sink,
            gateway,
            model,
            conversation_id: conversation_id.into(),
            state: Arc::new(RwLock::new(VoiceState::Idle)),
            session: Mutex::new(None),
            event_tx,
        }
    }

    /// Begin recording
    ///
    /// Legal only from `Idle`. A capture-open failure leaves the state
    /// untouched.
    pub async fn start(&self) -> Result<(), VoiceError> {
        let mut session_slot = self.session.lock().await;

        {
            let state = self.state.read().await;
            if *state != VoiceState::Idle {
                return Err(VoiceError::IllegalTransition {
                    from: *state,
                    action: "start",
                });
            }
        }

        let session = self
            .capture
            .open()
            .map_err(|e| VoiceError::CaptureUnavailable(e.to_string()))?;
        *session_slot = Some(session);
        drop(session_slot);

        self.set_state(VoiceState::Recording).await;
        Ok(())
    }

    /// Finish recording and run the full cycle
    ///
    /// Legal only from `Recording`. The capture session is finalized and
    /// released before anything that can fail; every later failure moves to
    /// `Error` and propagates its own kind.
    pub async fn stop(&self) -> Result<VoiceTurn, VoiceError> {
        let mut session_slot = self.session.lock().await;

        {
            let state = self.state.read().await;
            if *state != VoiceState::Recording {
                return Err(VoiceError::IllegalTransition {
                    from: *state,
                    action: "stop",
                });
            }
        }

        let audio = match session_slot.take() {
            Some(session) => session.finish(),
            None => Vec::new(),
        };
        drop(session_slot);

        self.run_cycle(audio).await
    }

    /// Drop any lingering capture session and return to `Idle`
    ///
    /// Legal from every state; this is both error recovery and the abort
    /// path. No automatic retries happen anywhere in the pipeline.
    pub async fn reset(&self) {
        self.session.lock().await.take();
        self.set_state(VoiceState::Idle).await;
    }

    pub async fn state(&self) -> VoiceState {
        *self.state.read().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VoiceEvent> {
        self.event_tx.subscribe()
    }

    async fn run_cycle(&self, audio: Vec<u8>) -> Result<VoiceTurn, VoiceError> {
        self.set_state(VoiceState::Transcribing).await;
        let transcript = match self.stt.transcribe(&audio).await {
            Ok(text) => text,
            Err(e) => {
                return Err(self
                    .fail(VoiceError::TranscriptionFailed(e.to_string()))
                    .await)
            }
        };
        if transcript.trim().is_empty() {
            // Nothing intelligible in the clip; no exchange, no appends.
            return Err(self
                .fail(VoiceError::TranscriptionFailed(
                    "empty transcript".to_string(),
                ))
                .await);
        }
        let _ = self.event_tx.send(VoiceEvent::Transcript {
            text: transcript.clone(),
        });

        self.set_state(VoiceState::Generating).await;
        let outcome = match self
            .gateway
            .exchange(&self.conversation_id, &self.model, &transcript, None)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.fail(VoiceError::Gateway(e)).await),
        };
        let _ = self.event_tx.send(VoiceEvent::Reply {
            text: outcome.reply.clone(),
        });

        self.set_state(VoiceState::Synthesizing).await;
        let audio_reply = match self.tts.synthesize(&outcome.reply).await {
            Ok(bytes) => bytes,
            Err(e) => {
                // The exchange is done and recorded; keep the texts with
                // the error so the reply is not lost with the audio.
                return Err(self
                    .fail(VoiceError::SynthesisFailed {
                        transcript,
                        reply: outcome.reply,
                        message: e.to_string(),
                    })
                    .await);
            }
        };

        self.set_state(VoiceState::Playing).await;
        if let Err(e) = self.sink.play(&audio_reply).await {
            return Err(self.fail(VoiceError::PlaybackFailed(e.to_string())).await);
        }

        self.set_state(VoiceState::Idle).await;
        Ok(VoiceTurn {
            transcript,
            reply: outcome.reply,
            audio: audio_reply,
            persistence_warning: outcome.persistence_warning,
        })
    }

    async fn fail(&self, error: VoiceError) -> VoiceError {
        self.set_state(VoiceState::Error).await;
        let _ = self.event_tx.send(VoiceEvent::Failed {
            message: error.to_string(),
        });
        error
    }

    async fn set_state(&self, new_state: VoiceState) {
        let old_state = {
            let mut state = self.state.write().await;
            let old = *state;
            *state = new_state;
            old
        };

        if old_state != new_state {
            let _ = self.event_tx.send(VoiceEvent::StateChanged {
                old: old_state,
                new: new_state,
            });
        }
    }
}
