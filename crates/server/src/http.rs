//! HTTP Endpoints
//!
//! REST API for the conversation gateway: text exchange, model catalog and
//! pull, voice turns, health, metrics.

use axum::{
    extract::{Json, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use samvad_core::{ModelId, ModelIdError};
use samvad_gateway::{GatewayError, VoiceError};
use samvad_llm::LlmError;

use crate::metrics::{
    metrics_handler, record_error, record_generation_latency, record_persistence_failure,
    record_request,
};
use crate::state::AppState;
use crate::voice;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(
        &state.config.server.cors_origins,
        state.config.server.cors_enabled,
    );

    Router::new()
        // Text exchange
        .route("/api/chat", post(chat))
        // Local model catalog and pull
        .route("/api/models/local", get(local_models))
        .route("/api/models/pull", post(pull_model))
        // One full voice cycle
        .route("/api/voice/turn", post(voice::voice_turn))
        // Health check
        .route("/health", get(health_check))
        // Prometheus metrics
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Build the CORS layer from configured origins
///
/// With CORS disabled the layer is permissive (development only). An empty
/// or fully unparseable origin list falls back to the local UI origin
/// rather than a wildcard.
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if parsed.is_empty() {
        tracing::info!("No CORS origins configured, defaulting to localhost:3000");
        return CorsLayer::new()
            .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any);
    }

    tracing::info!("CORS configured with {} origins", parsed.len());
    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(true)
}

/// Error envelope returned by every endpoint: `{error, kind}`
///
/// The status separates configuration problems (400/401/404) from upstream
/// faults (502/504) so a client can tell "fix your setup" from "try again".
#[derive(Debug)]
pub struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) kind: &'static str,
    pub(crate) message: String,
}

impl ApiError {
    pub(crate) fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message, "kind": self.kind });
        (self.status, Json(body)).into_response()
    }
}

fn classify_llm(err: &LlmError) -> (StatusCode, &'static str) {
    match err {
        LlmError::UnknownProvider(_) => (StatusCode::BAD_REQUEST, "unknown_provider"),
        LlmError::MissingCredential(_) => (StatusCode::UNAUTHORIZED, "missing_credential"),
        LlmError::ProviderResponse { .. } => (StatusCode::BAD_GATEWAY, "provider_error"),
        LlmError::Generation(_) => (StatusCode::BAD_GATEWAY, "generation_failed"),
        LlmError::InvalidResponse(_) => (StatusCode::BAD_GATEWAY, "invalid_response"),
        LlmError::Network(_) => (StatusCode::BAD_GATEWAY, "network_error"),
        LlmError::Timeout => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
        LlmError::ModelNotFound(_) => (StatusCode::NOT_FOUND, "model_not_found"),
    }
}

fn classify_gateway(err: &GatewayError) -> (StatusCode, &'static str) {
    match err {
        GatewayError::Llm(e) => classify_llm(e),
        GatewayError::Persistence { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "persistence_failed")
        }
    }
}

fn classify_voice(err: &VoiceError) -> (StatusCode, &'static str) {
    match err {
        VoiceError::CaptureUnavailable(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "capture_unavailable")
        }
        VoiceError::TranscriptionFailed(_) => (StatusCode::BAD_GATEWAY, "transcription_failed"),
        VoiceError::SynthesisFailed { .. } => (StatusCode::BAD_GATEWAY, "synthesis_failed"),
        VoiceError::PlaybackFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "playback_failed"),
        VoiceError::IllegalTransition { .. } => (StatusCode::CONFLICT, "pipeline_busy"),
        VoiceError::Gateway(e) => classify_gateway(e),
    }
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        let (status, kind) = classify_llm(&err);
        Self::new(status, kind, err.to_string())
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let (status, kind) = classify_gateway(&err);
        Self::new(status, kind, err.to_string())
    }
}

impl From<VoiceError> for ApiError {
    fn from(err: VoiceError) -> Self {
        let (status, kind) = classify_voice(&err);
        Self::new(status, kind, err.to_string())
    }
}

/// Chat request (original wire field names)
#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
    model: String,
    #[serde(rename = "conversationId")]
    conversation_id: String,
}

/// Chat response
#[derive(Debug, Serialize)]
struct ChatResponse {
    reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<&'static str>,
}

/// Chat endpoint
///
/// `/pull <model>` turns are commands: the pull runs, nothing reaches the
/// transcript. Everything else is one gateway exchange.
async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    record_request("chat");

    if let Some(model_name) = parse_pull_command(&request.message) {
        tracing::info!(model = model_name, "Pull requested via chat command");
        state.ollama.pull_model(model_name).await.map_err(|e| {
            let api = ApiError::from(e);
            record_error(api.kind);
            api
        })?;
        return Ok(Json(ChatResponse {
            reply: format!("Pulled model '{}'", model_name),
            warning: None,
        }));
    }

    let model: ModelId = request.model.parse().map_err(|e: ModelIdError| {
        record_error("invalid_model");
        ApiError::new(StatusCode::BAD_REQUEST, "invalid_model", e.to_string())
    })?;

    match state
        .gateway
        .exchange(&request.conversation_id, &model, &request.message, None)
        .await
    {
        Ok(outcome) => {
            record_generation_latency(outcome.generation_ms);
            if outcome.persistence_warning.is_some() {
                record_persistence_failure("assistant");
            }
            Ok(Json(ChatResponse {
                reply: outcome.reply,
                warning: outcome
                    .persistence_warning
                    .as_ref()
                    .map(|_| "persistence_failed"),
            }))
        }
        Err(err) => {
            if let GatewayError::Persistence { stage, .. } = &err {
                record_persistence_failure(stage.as_str());
            }
            let api = ApiError::from(err);
            record_error(api.kind);
            Err(api)
        }
    }
}

/// Parse a `/pull <model>` command turn
fn parse_pull_command(message: &str) -> Option<&str> {
    let rest = message.trim().strip_prefix("/pull")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let name = rest.trim();
    (!name.is_empty()).then_some(name)
}

/// List models available on the local runtime
async fn local_models(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    record_request("models_local");
    let models = state.ollama.list_models().await.map_err(|e| {
        let api = ApiError::from(e);
        record_error(api.kind);
        api
    })?;
    Ok(Json(models))
}

/// Pull request
#[derive(Debug, Deserialize)]
struct PullRequest {
    model: String,
}

/// Pull a model onto the local runtime
///
/// Long-running; the pull timeout, not the generation timeout, governs it.
async fn pull_model(
    State(state): State<AppState>,
    Json(request): Json<PullRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    record_request("models_pull");
    state.ollama.pull_model(&request.model).await.map_err(|e| {
        let api = ApiError::from(e);
        record_error(api.kind);
        api
    })?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Health check reporting dependency reachability
///
/// Unreachable voice sidecars degrade the report but only a dead local
/// runtime flips the status code; text chat against remote providers may
/// still work without it, voice cannot work without its sidecars.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let mut checks = serde_json::Map::new();

    let ollama_ok = state.ollama.is_available().await;
    checks.insert(
        "ollama".to_string(),
        serde_json::json!({
            "status": if ollama_ok { "ok" } else { "unreachable" },
            "endpoint": state.config.ollama.endpoint.clone()
        }),
    );

    let stt_ok = state.stt.is_available().await;
    checks.insert(
        "stt".to_string(),
        serde_json::json!({
            "status": if stt_ok { "ok" } else { "unreachable" },
            "url": state.config.voice.stt_url.clone()
        }),
    );

    let tts_ok = state.tts.is_available().await;
    checks.insert(
        "tts".to_string(),
        serde_json::json!({
            "status": if tts_ok { "ok" } else { "unreachable" },
            "url": state.config.voice.tts_url.clone()
        }),
    );

    let status = if ollama_ok && stt_ok && tts_ok {
        "healthy"
    } else {
        "degraded"
    };
    let status_code = if ollama_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": status,
            "version": env!("CARGO_PKG_VERSION"),
            "checks": checks
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use samvad_config::{ProviderSettings, Settings};
    use tower::ServiceExt;

    fn state_from(settings: Settings) -> AppState {
        AppState::from_settings(settings).unwrap()
    }

    async fn post_json(
        router: Router,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[test]
    fn test_parse_pull_command() {
        assert_eq!(parse_pull_command("/pull qwen3:4b"), Some("qwen3:4b"));
        assert_eq!(parse_pull_command("  /pull   llama3.2 "), Some("llama3.2"));
        assert_eq!(parse_pull_command("hello there"), None);
        assert_eq!(parse_pull_command("/pull"), None);
        assert_eq!(parse_pull_command("/pullet surprise"), None);
    }

    #[tokio::test]
    async fn test_chat_unknown_provider_maps_to_400() {
        let app = create_router(state_from(Settings::default()));
        let (status, body) = post_json(
            app,
            "/api/chat",
            serde_json::json!({
                "message": "hello",
                "model": "remote::gemini::gemini-2.0-flash",
                "conversationId": "c1"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "unknown_provider");
        assert!(body["error"].as_str().unwrap().contains("gemini"));
    }

    #[tokio::test]
    async fn test_chat_missing_credential_maps_to_401() {
        let mut settings = Settings::default();
        settings
            .providers
            .insert("gemini".to_string(), ProviderSettings::default());

        let app = create_router(state_from(settings));
        let (status, body) = post_json(
            app,
            "/api/chat",
            serde_json::json!({
                "message": "hello",
                "model": "remote::gemini::gemini-2.0-flash",
                "conversationId": "c1"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["kind"], "missing_credential");
    }

    #[tokio::test]
    async fn test_chat_malformed_model_maps_to_400() {
        let app = create_router(state_from(Settings::default()));
        let (status, body) = post_json(
            app,
            "/api/chat",
            serde_json::json!({
                "message": "hello",
                "model": "remote::gemini",
                "conversationId": "c1"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "invalid_model");
    }

    #[tokio::test]
    async fn test_voice_turn_rejects_bad_base64() {
        let app = create_router(state_from(Settings::default()));
        let (status, body) = post_json(
            app,
            "/api/voice/turn",
            serde_json::json!({ "audio": "!!not-base64!!" }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "invalid_request");
    }

    #[tokio::test]
    async fn test_voice_turn_rejects_empty_audio() {
        let app = create_router(state_from(Settings::default()));
        let (status, body) =
            post_json(app, "/api/voice/turn", serde_json::json!({ "audio": "" })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "invalid_request");
    }

    #[tokio::test]
    async fn test_metrics_route_renders() {
        crate::metrics::init_metrics();
        record_request("chat");

        let app = create_router(state_from(Settings::default()));
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("samvad_requests_total"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = create_router(state_from(Settings::default()));
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
