//! In-memory transcript log

use async_trait::async_trait;
use parking_lot::Mutex;

use samvad_core::{Role, TranscriptEntry};

use crate::{PersistenceError, TranscriptStore};

/// Process-local append-only log
///
/// The default store, and the one tests assert against: `entries` and
/// `conversation` expose the append order directly.
#[derive(Debug, Default)]
pub struct MemoryTranscriptStore {
    entries: Mutex<Vec<TranscriptEntry>>,
}

impl MemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every append so far, in order
    pub fn entries(&self) -> Vec<TranscriptEntry> {
        self.entries.lock().clone()
    }

    /// Appends for one conversation, in order
    pub fn conversation(&self, conversation_id: &str) -> Vec<TranscriptEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl TranscriptStore for MemoryTranscriptStore {
    async fn append(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
        model: &str,
    ) -> Result<(), PersistenceError> {
        self.entries
            .lock()
            .push(TranscriptEntry::new(conversation_id, role, content, model));
        Ok(())
    }
}
