//! Voice Turn Endpoint
//!
//! One push-to-talk exchange: base64 audio in, transcript + reply +
//! synthesized audio out. The browser records and plays; the server runs
//! the pipeline between the two.

use std::time::Instant;

use axum::extract::{Json, State};
use axum::http::StatusCode;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use samvad_gateway::VoiceError;

use crate::http::ApiError;
use crate::metrics::{
    record_error, record_persistence_failure, record_request, record_voice_latency,
};
use crate::state::AppState;

/// Voice turn request: one finished clip, base64 encoded
#[derive(Debug, Deserialize)]
pub struct VoiceTurnRequest {
    pub audio: String,
}

/// Voice turn response
///
/// `audio` is null when synthesis failed; the texts still stand.
#[derive(Debug, Serialize)]
pub struct VoiceTurnResponse {
    pub transcript: String,
    pub reply: String,
    pub audio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<&'static str>,
}

/// Drive one full pipeline cycle over an uploaded clip
pub async fn voice_turn(
    State(state): State<AppState>,
    Json(request): Json<VoiceTurnRequest>,
) -> Result<Json<VoiceTurnResponse>, ApiError> {
    record_request("voice_turn");

    let audio = BASE64.decode(request.audio.as_bytes()).map_err(|e| {
        record_error("invalid_request");
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            format!("Audio is not valid base64: {}", e),
        )
    })?;
    if audio.is_empty() {
        record_error("invalid_request");
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "Audio payload is empty",
        ));
    }

    state.capture.deposit(audio);

    let started = Instant::now();
    if let Err(err) = state.voice.start().await {
        return Err(recover(&state, err).await);
    }

    match state.voice.stop().await {
        Ok(turn) => {
            record_voice_latency(started.elapsed().as_millis() as u64);
            if turn.persistence_warning.is_some() {
                record_persistence_failure("assistant");
            }
            Ok(Json(VoiceTurnResponse {
                transcript: turn.transcript,
                reply: turn.reply,
                audio: Some(BASE64.encode(&turn.audio)),
                warning: turn
                    .persistence_warning
                    .as_ref()
                    .map(|_| "persistence_failed"),
            }))
        }
        // The exchange finished; only the audio is missing. Deliver the
        // texts with a warning instead of discarding the reply.
        Err(VoiceError::SynthesisFailed {
            transcript,
            reply,
            message,
        }) => {
            tracing::warn!(error = %message, "Synthesis failed; returning text-only turn");
            state.voice.reset().await;
            record_error("synthesis_failed");
            Ok(Json(VoiceTurnResponse {
                transcript,
                reply,
                audio: None,
                warning: Some("synthesis_failed"),
            }))
        }
        Err(err) => Err(recover(&state, err).await),
    }
}

/// Map a failed cycle to its response and put the pipeline back in service
///
/// A busy pipeline is left alone: resetting it would tear down the turn
/// that owns it.
async fn recover(state: &AppState, err: VoiceError) -> ApiError {
    if !matches!(err, VoiceError::IllegalTransition { .. }) {
        state.voice.reset().await;
    }
    let api = ApiError::from(err);
    record_error(api.kind);
    api
}
