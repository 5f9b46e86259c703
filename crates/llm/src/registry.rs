//! Provider registry: turns a parsed `ModelId` into a ready backend
//!
//! Local identifiers pass through to the Ollama client. Remote identifiers
//! are looked up in the configured provider table; an unconfigured provider
//! or an absent credential is a typed refusal, decided before any network
//! traffic.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;

use samvad_config::{ProviderSettings, Settings};
use samvad_core::ModelId;

use crate::backend::ModelBackend;
use crate::ollama::{OllamaBackend, OllamaClient};
use crate::remote::RemoteBackend;
use crate::LlmError;

/// Resolution seam between the gateway and concrete backends
pub trait BackendResolver: Send + Sync {
    fn resolve(&self, model: &ModelId) -> Result<Arc<dyn ModelBackend>, LlmError>;
}

pub struct ProviderRegistry {
    ollama: OllamaClient,
    providers: HashMap<String, ProviderSettings>,
    http: Client,
}

impl ProviderRegistry {
    pub fn new(ollama: OllamaClient, providers: HashMap<String, ProviderSettings>) -> Self {
        Self {
            ollama,
            providers,
            http: Client::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            OllamaClient::new(&settings.ollama),
            settings.providers.clone(),
        )
    }

    /// The shared local runtime client (catalog and pull operations)
    pub fn ollama(&self) -> &OllamaClient {
        &self.ollama
    }

    /// Completions endpoint for providers without an explicit override
    fn default_endpoint(provider: &str) -> String {
        format!("https://api.{}.com/v1/chat/completions", provider)
    }
}

impl BackendResolver for ProviderRegistry {
    fn resolve(&self, model: &ModelId) -> Result<Arc<dyn ModelBackend>, LlmError> {
        match model {
            ModelId::Local(name) => Ok(Arc::new(OllamaBackend::new(
                self.ollama.clone(),
                name.clone(),
            ))),
            ModelId::Remote { provider, model } => {
                let provider_settings = self
                    .providers
                    .get(provider)
                    .ok_or_else(|| LlmError::UnknownProvider(provider.clone()))?;

                // An empty or whitespace key is no credential at all;
                // it must never reach the wire.
                let api_key = provider_settings
                    .api_key
                    .as_deref()
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .ok_or_else(|| LlmError::MissingCredential(provider.clone()))?;

                let endpoint = provider_settings
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| Self::default_endpoint(provider));

                Ok(Arc::new(RemoteBackend::new(
                    provider.clone(),
                    model.clone(),
                    endpoint,
                    api_key,
                    provider_settings.request_timeout_ms,
                    self.http.clone(),
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use samvad_config::OllamaSettings;

    fn registry_with(providers: HashMap<String, ProviderSettings>) -> ProviderRegistry {
        ProviderRegistry::new(OllamaClient::new(&OllamaSettings::default()), providers)
    }

    fn remote_gemini() -> ModelId {
        "remote::gemini::gemini-1.5-pro".parse::<ModelId>().unwrap()
    }

    #[test]
    fn test_local_resolution() {
        let registry = registry_with(HashMap::new());
        let backend = registry
            .resolve(&ModelId::Local("llama3.2".to_string()))
            .unwrap();
        assert_eq!(backend.model_name(), "llama3.2");
    }

    #[test]
    fn test_unknown_provider() {
        let registry = registry_with(HashMap::new());
        let err = registry.resolve(&remote_gemini()).unwrap_err();
        assert!(matches!(err, LlmError::UnknownProvider(p) if p == "gemini"));
    }

    #[test]
    fn test_missing_credential() {
        let mut providers = HashMap::new();
        providers.insert("gemini".to_string(), ProviderSettings::default());
        let registry = registry_with(providers);
        let err = registry.resolve(&remote_gemini()).unwrap_err();
        assert!(matches!(err, LlmError::MissingCredential(p) if p == "gemini"));
    }

    #[test]
    fn test_blank_credential_rejected() {
        let mut providers = HashMap::new();
        providers.insert(
            "gemini".to_string(),
            ProviderSettings {
                api_key: Some("   ".to_string()),
                ..Default::default()
            },
        );
        let registry = registry_with(providers);
        let err = registry.resolve(&remote_gemini()).unwrap_err();
        assert!(matches!(err, LlmError::MissingCredential(_)));
    }

    #[test]
    fn test_remote_resolution() {
        let mut providers = HashMap::new();
        providers.insert(
            "gemini".to_string(),
            ProviderSettings {
                api_key: Some("sk-live".to_string()),
                ..Default::default()
            },
        );
        let registry = registry_with(providers);
        let backend = registry.resolve(&remote_gemini()).unwrap();
        assert_eq!(backend.model_name(), "gemini-1.5-pro");
    }

    #[test]
    fn test_default_endpoint_template() {
        assert_eq!(
            ProviderRegistry::default_endpoint("openai"),
            "https://api.openai.com/v1/chat/completions"
        );
    }
}
