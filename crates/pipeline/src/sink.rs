//! Playback seam

use async_trait::async_trait;

use crate::PipelineError;

/// Destination for synthesized audio
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play the clip to completion
    async fn play(&self, audio: &[u8]) -> Result<(), PipelineError>;
}

/// Sink that discards audio
///
/// The server returns synthesized audio to the browser, which plays it
/// there; server-side playback is a no-op.
pub struct NullSink;

#[async_trait]
impl AudioSink for NullSink {
    async fn play(&self, _audio: &[u8]) -> Result<(), PipelineError> {
        Ok(())
    }
}
