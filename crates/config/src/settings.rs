//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::{endpoints, timeouts, voice};
use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Local runtime (Ollama) configuration
    #[serde(default)]
    pub ollama: OllamaSettings,

    /// Remote providers, keyed by provider name
    ///
    /// A provider must appear here to be resolvable at all; its `api_key`
    /// must be present and non-empty before any request is made.
    #[serde(default)]
    pub providers: HashMap<String, ProviderSettings>,

    /// Transcript persistence configuration
    #[serde(default)]
    pub persistence: PersistenceSettings,

    /// Voice pipeline configuration
    #[serde(default)]
    pub voice: VoiceSettings,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins (empty = localhost default)
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Enforce the CORS origin list (false = permissive, dev only)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            cors_origins: Vec::new(),
            cors_enabled: true,
        }
    }
}

/// Local runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaSettings {
    /// Ollama API endpoint
    #[serde(default = "default_ollama_endpoint")]
    pub endpoint: String,

    /// Generation request timeout (ms)
    #[serde(default = "default_generation_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Model pull timeout (ms); pulls are long-running downloads
    #[serde(default = "default_pull_timeout_ms")]
    pub pull_timeout_ms: u64,

    /// How long the runtime keeps the model loaded between calls
    #[serde(default = "default_keep_alive")]
    pub keep_alive: String,
}

fn default_ollama_endpoint() -> String {
    endpoints::OLLAMA_DEFAULT.to_string()
}

fn default_generation_timeout_ms() -> u64 {
    timeouts::GENERATION_MS
}

fn default_pull_timeout_ms() -> u64 {
    timeouts::PULL_MS
}

fn default_keep_alive() -> String {
    "5m".to_string()
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            endpoint: default_ollama_endpoint(),
            request_timeout_ms: default_generation_timeout_ms(),
            pull_timeout_ms: default_pull_timeout_ms(),
            keep_alive: default_keep_alive(),
        }
    }
}

/// One remote provider entry
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderSettings {
    /// Bearer credential for this provider; never logged
    #[serde(default)]
    pub api_key: Option<String>,

    /// Completions endpoint override; defaults to the provider template
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Request timeout (ms)
    #[serde(default = "default_provider_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_provider_timeout_ms() -> u64 {
    timeouts::PROVIDER_MS
}

/// Transcript store selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    /// In-memory log (development and tests)
    #[default]
    Memory,
    /// REST message log (PostgREST-style insert endpoint)
    Http,
}

/// Transcript persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersistenceSettings {
    /// Which store implementation to use
    #[serde(default)]
    pub backend: PersistenceBackend,

    /// Base URL of the REST message log (required for `http`)
    #[serde(default)]
    pub api_url: Option<String>,

    /// Bearer credential for the REST message log
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Voice pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Speech-to-text sidecar URL
    #[serde(default = "default_sidecar_url")]
    pub stt_url: String,

    /// Text-to-speech sidecar URL
    #[serde(default = "default_sidecar_url")]
    pub tts_url: String,

    /// Model identifier used for voice turns
    #[serde(default = "default_voice_model")]
    pub model: String,

    /// Conversation id reserved for voice turns
    #[serde(default = "default_voice_conversation_id")]
    pub conversation_id: String,

    /// Sidecar request timeout (ms)
    #[serde(default = "default_sidecar_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_sidecar_url() -> String {
    endpoints::VOICE_SIDECAR_DEFAULT.to_string()
}

fn default_voice_model() -> String {
    voice::DEFAULT_MODEL.to_string()
}

fn default_voice_conversation_id() -> String {
    voice::CONVERSATION_ID.to_string()
}

fn default_sidecar_timeout_ms() -> u64 {
    timeouts::SIDECAR_MS
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stt_url: default_sidecar_url(),
            tts_url: default_sidecar_url(),
            model: default_voice_model(),
            conversation_id: default_voice_conversation_id(),
            timeout_ms: default_sidecar_timeout_ms(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level for the samvad crates
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON-formatted logs
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_ollama()?;
        self.validate_providers()?;
        self.validate_persistence()?;
        self.validate_voice()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    fn validate_ollama(&self) -> Result<(), ConfigError> {
        if self.ollama.endpoint.is_empty() {
            return Err(ConfigError::MissingField("ollama.endpoint".to_string()));
        }
        if self.ollama.request_timeout_ms < 1_000 {
            return Err(ConfigError::InvalidValue {
                field: "ollama.request_timeout_ms".to_string(),
                message: "Timeout too low (minimum 1000ms)".to_string(),
            });
        }
        Ok(())
    }

    fn validate_providers(&self) -> Result<(), ConfigError> {
        for (name, provider) in &self.providers {
            // An entry with a blank key is a misconfiguration, not a
            // credential; resolution would otherwise proceed with it.
            if let Some(key) = &provider.api_key {
                if key.trim().is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: format!("providers.{}.api_key", name),
                        message: "Credential must not be empty".to_string(),
                    });
                }
            }
            if let Some(endpoint) = &provider.endpoint {
                if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                    return Err(ConfigError::InvalidValue {
                        field: format!("providers.{}.endpoint", name),
                        message: format!("Not an HTTP(S) URL: {}", endpoint),
                    });
                }
            }
        }
        Ok(())
    }

    fn validate_persistence(&self) -> Result<(), ConfigError> {
        if self.persistence.backend == PersistenceBackend::Http {
            match &self.persistence.api_url {
                Some(url) if !url.is_empty() => {}
                _ => {
                    return Err(ConfigError::MissingField(
                        "persistence.api_url".to_string(),
                    ))
                }
            }
        }
        Ok(())
    }

    fn validate_voice(&self) -> Result<(), ConfigError> {
        if self.voice.conversation_id.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "voice.conversation_id".to_string(),
                message: "Voice conversation id must not be empty".to_string(),
            });
        }
        if self.voice.timeout_ms < 1_000 {
            return Err(ConfigError::InvalidValue {
                field: "voice.timeout_ms".to_string(),
                message: "Timeout too low (minimum 1000ms)".to_string(),
            });
        }
        Ok(())
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (SAMVAD_ prefix, `__` separator)
/// 2. config/{env}.toml (if env specified)
/// 3. config/default.toml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    // Load default config
    builder = builder.add_source(File::with_name("config/default").required(false));

    // Load environment-specific config
    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    // Load from environment variables
    builder = builder.add_source(
        Environment::with_prefix("SAMVAD")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    // Validate
    settings.validate()?;

    Ok(settings)
}
