//! Core types for the samvad conversation gateway
//!
//! This crate provides the foundational types used across all other crates:
//! - Chat message and role types
//! - Model identifiers (local runtime vs. remote provider)
//! - Persisted transcript entry types

pub mod message;
pub mod model_id;
pub mod transcript;

pub use message::{Message, Role};
pub use model_id::{ModelId, ModelIdError, REMOTE_PREFIX};
pub use transcript::TranscriptEntry;
