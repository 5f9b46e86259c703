//! Backend trait and generation result types
//!
//! Streaming and single-shot backends sit behind one `generate` method: a
//! streaming backend forwards each fragment to the optional observer channel
//! as it arrives, a single-shot backend sends the full text once. Either way
//! the returned result carries the complete reply.

use async_trait::async_trait;
use tokio::sync::mpsc;

use samvad_core::Message;

use crate::LlmError;

/// Result of one generation
#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// Complete reply text
    pub text: String,
    /// Model that produced it
    pub model: String,
    /// Fragments received (streaming) or completion tokens reported (remote)
    pub tokens: usize,
    /// Time to first fragment (ms), streaming backends only
    pub time_to_first_token_ms: Option<u64>,
    /// Total generation time (ms)
    pub total_time_ms: u64,
    /// Finish reason
    pub finish_reason: FinishReason,
}

/// Finish reason
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural end of generation
    Stop,
    /// Provider truncated at its token limit
    Length,
    /// Observer channel closed before the stream finished
    Cancelled,
}

/// Model backend trait
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Generate a reply to the conversation so far
    ///
    /// When `fragments` is supplied, every incremental piece of the reply is
    /// sent on it in order; concatenated they equal `GenerationResult::text`.
    /// A closed observer channel cancels an in-flight stream; the partial
    /// result is returned with `FinishReason::Cancelled`.
    async fn generate(
        &self,
        messages: &[Message],
        fragments: Option<mpsc::Sender<String>>,
    ) -> Result<GenerationResult, LlmError>;

    /// Check if the backend can currently serve requests
    async fn is_available(&self) -> bool;

    /// Model name this backend generates with
    fn model_name(&self) -> &str;
}

impl std::fmt::Debug for dyn ModelBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBackend")
            .field("model", &self.model_name())
            .finish_non_exhaustive()
    }
}
