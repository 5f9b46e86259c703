//! Model identifiers
//!
//! A model identifier selects the backend kind: a bare Ollama model name
//! (`qwen3:1.7b`) runs locally, a `remote::<provider>::<model>` identifier
//! runs against that provider's hosted completions endpoint. Every
//! identifier parses to exactly one kind; a malformed identifier is a
//! configuration error surfaced before any backend work starts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Prefix marking remote identifiers
pub const REMOTE_PREFIX: &str = "remote::";

/// Errors from parsing a model identifier
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelIdError {
    #[error("empty model identifier")]
    Empty,

    #[error("malformed remote identifier '{0}': expected remote::<provider>::<model>")]
    MalformedRemote(String),
}

/// Parsed model identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModelId {
    /// Model served by the local runtime
    Local(String),
    /// Model served by a remote provider
    Remote { provider: String, model: String },
}

impl ModelId {
    /// Parse an identifier string
    pub fn parse(s: &str) -> Result<Self, ModelIdError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ModelIdError::Empty);
        }

        match s.strip_prefix(REMOTE_PREFIX) {
            None => Ok(Self::Local(s.to_string())),
            Some(rest) => {
                // The model segment may itself contain "::", so split once.
                let (provider, model) = rest
                    .split_once("::")
                    .ok_or_else(|| ModelIdError::MalformedRemote(s.to_string()))?;
                if provider.is_empty() || model.is_empty() {
                    return Err(ModelIdError::MalformedRemote(s.to_string()));
                }
                Ok(Self::Remote {
                    provider: provider.to_string(),
                    model: model.to_string(),
                })
            }
        }
    }

    /// Provider name for remote identifiers
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Local(_) => None,
            Self::Remote { provider, .. } => Some(provider),
        }
    }

    /// Model name as the backend sees it
    pub fn model(&self) -> &str {
        match self {
            Self::Local(name) => name,
            Self::Remote { model, .. } => model,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}

impl FromStr for ModelId {
    type Err = ModelIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(name) => f.write_str(name),
            Self::Remote { provider, model } => {
                write!(f, "{}{}::{}", REMOTE_PREFIX, provider, model)
            }
        }
    }
}

impl TryFrom<String> for ModelId {
    type Error = ModelIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ModelId> for String {
    fn from(id: ModelId) -> Self {
        id.to_string()
    }
}
