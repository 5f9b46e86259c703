//! Default endpoints and limits shared across the workspace
//!
//! Single source of truth for service defaults so they are not duplicated
//! across crates.

/// Service endpoints (defaults for local development)
pub mod endpoints {
    /// Ollama runtime endpoint
    pub const OLLAMA_DEFAULT: &str = "http://localhost:11434";

    /// Speech sidecar (STT + TTS) endpoint
    pub const VOICE_SIDECAR_DEFAULT: &str = "http://127.0.0.1:5001";
}

/// Voice mode defaults
pub mod voice {
    /// Model used for voice turns when none is configured
    pub const DEFAULT_MODEL: &str = "qwen3:1.7b";

    /// Conversation id reserved for voice turns
    pub const CONVERSATION_ID: &str = "voice";
}

/// Timeout defaults (milliseconds)
pub mod timeouts {
    /// Chat generation requests
    pub const GENERATION_MS: u64 = 120_000;

    /// Model pulls are long-running downloads
    pub const PULL_MS: u64 = 1_800_000;

    /// Speech sidecar requests (transcription / synthesis)
    pub const SIDECAR_MS: u64 = 60_000;

    /// Remote provider completions
    pub const PROVIDER_MS: u64 = 60_000;
}
