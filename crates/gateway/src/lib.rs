//! Exchange orchestration and the voice pipeline
//!
//! `ConversationGateway` owns the text path: append, resolve, generate,
//! append. `VoicePipeline` wraps the same gateway in the push-to-talk state
//! machine, so voice turns and text turns land in the transcript through
//! one code path.

pub mod gateway;
pub mod voice;

pub use gateway::{ConversationGateway, ExchangeOutcome, GatewayError};
pub use voice::{
    VoiceCollaborators, VoiceError, VoiceEvent, VoicePipeline, VoiceState, VoiceTurn,
};
