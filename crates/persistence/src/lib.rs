//! Transcript persistence for the gateway
//!
//! One concern: an append-only log of conversation turns. Two stores ship:
//! - `MemoryTranscriptStore` — process-local, the default and the test double
//! - `HttpTranscriptStore` — REST insert into a hosted message table

pub mod http;
pub mod memory;

pub use http::HttpTranscriptStore;
pub use memory::MemoryTranscriptStore;

use async_trait::async_trait;
use thiserror::Error;

use samvad_core::Role;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Store unreachable: {0}")]
    Connection(String),

    #[error("Store rejected the append: status {status}")]
    Request { status: u16 },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Append-only conversation log
///
/// Entries within one conversation are ordered by append time. There is no
/// read contract; callers that need to inspect the log in tests use the
/// in-memory store's helpers.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    async fn append(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
        model: &str,
    ) -> Result<(), PersistenceError>;
}
