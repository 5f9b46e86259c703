//! Configuration management for the gateway
//!
//! Supports loading configuration from:
//! - TOML files (config/default.toml, config/{env}.toml)
//! - Environment variables (SAMVAD_ prefix, `__` separator)
//!
//! Remote provider credentials live under `[providers.<name>]` tables;
//! they are validated at load time and never logged.

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, ObservabilityConfig, OllamaSettings, PersistenceBackend, PersistenceSettings,
    ProviderSettings, ServerConfig, Settings, VoiceSettings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Environment error: {0}")]
    Environment(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
