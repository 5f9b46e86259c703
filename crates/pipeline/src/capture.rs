//! Audio capture seam
//!
//! A capture source opens one session per recording. The session owns the
//! device or buffer for its lifetime; dropping it releases the resource, so
//! error and cancellation paths need no extra bookkeeping.

use parking_lot::Mutex;

use crate::PipelineError;

/// Source of recordable audio
pub trait AudioCapture: Send + Sync {
    /// Open a recording session
    ///
    /// At most one session is live per source; the previous session must be
    /// finished or dropped first.
    fn open(&self) -> Result<Box<dyn CaptureSession>, PipelineError>;
}

/// One in-progress recording
pub trait CaptureSession: Send {
    /// Finalize the recording, consuming the session and releasing the
    /// underlying resource
    fn finish(self: Box<Self>) -> Vec<u8>;
}

/// Capture source fed by externally recorded clips
///
/// The voice HTTP route records in the browser and uploads the finished
/// clip; the server stages it here and drives the pipeline over it exactly
/// as if it came from a device.
#[derive(Default)]
pub struct BufferCapture {
    next_clip: Mutex<Option<Vec<u8>>>,
}

impl BufferCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage the clip the next session will yield
    pub fn deposit(&self, audio: Vec<u8>) {
        *self.next_clip.lock() = Some(audio);
    }
}

impl AudioCapture for BufferCapture {
    fn open(&self) -> Result<Box<dyn CaptureSession>, PipelineError> {
        let clip = self
            .next_clip
            .lock()
            .take()
            .ok_or_else(|| PipelineError::Capture("no audio staged".to_string()))?;
        Ok(Box::new(BufferSession { clip }))
    }
}

struct BufferSession {
    clip: Vec<u8>,
}

impl CaptureSession for BufferSession {
    fn finish(self: Box<Self>) -> Vec<u8> {
        self.clip
    }
}
