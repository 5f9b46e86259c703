//! Model backends for the gateway
//!
//! Features:
//! - `ModelBackend` trait unifying streaming and single-shot generation
//! - `OllamaBackend` for the local runtime (streaming NDJSON)
//! - `RemoteBackend` for OpenAI-compatible provider APIs (single shot)
//! - `ProviderRegistry` resolving a `ModelId` to a ready backend

pub mod backend;
pub mod ollama;
pub mod registry;
pub mod remote;

pub use backend::{FinishReason, GenerationResult, ModelBackend};
pub use ollama::{OllamaBackend, OllamaClient};
pub use registry::{BackendResolver, ProviderRegistry};
pub use remote::RemoteBackend;

use thiserror::Error;

/// Backend and resolution errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("No credential configured for provider: {0}")]
    MissingCredential(String),

    #[error("Provider {provider} returned status {status}")]
    ProviderResponse { provider: String, status: u16 },

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout")]
    Timeout,

    #[error("Model not found: {0}")]
    ModelNotFound(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}
