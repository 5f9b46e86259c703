//! Persisted transcript entries

use crate::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One appended message as the transcript store records it.
///
/// Entries are immutable once appended; per-conversation ordering is the
/// append order, not `created_at` (provider latency skews wall-clock times).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    /// Display form of the model identifier the exchange ran against
    pub model: String,
    pub created_at: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn new(
        conversation_id: impl Into<String>,
        role: Role,
        content: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            role,
            content: content.into(),
            model: model.into(),
            created_at: Utc::now(),
        }
    }
}
