//! Voice pipeline collaborators
//!
//! The push-to-talk state machine in `samvad-gateway` drives four seams:
//! audio capture, speech-to-text, text-to-speech, and playback. Each is a
//! trait here with the production implementation beside it; tests swap in
//! mocks.

pub mod capture;
pub mod sink;
pub mod stt;
pub mod tts;

pub use capture::{AudioCapture, BufferCapture, CaptureSession};
pub use sink::{AudioSink, NullSink};
pub use stt::{HttpSttClient, SpeechToText};
pub use tts::{HttpTtsClient, TextToSpeech};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Transcription error: {0}")]
    Stt(String),

    #[error("Synthesis error: {0}")]
    Tts(String),

    #[error("Playback error: {0}")]
    Playback(String),
}
