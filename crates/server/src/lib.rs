//! Samvad Server
//!
//! HTTP surface over the conversation gateway and voice pipeline.

pub mod http;
pub mod metrics;
pub mod state;
pub mod voice;

pub use http::{create_router, ApiError};
pub use metrics::{
    init_metrics, record_error, record_generation_latency, record_persistence_failure,
    record_request, record_voice_latency,
};
pub use state::AppState;
