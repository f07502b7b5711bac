//! HTTP handlers: thin adapters between axum extractors and the turn orchestrator.

use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::header,
    response::{Html, IntoResponse},
    Json,
};
use parley_voice::{ConversationTurn, ReplyResult, VoiceError};
use serde::{Deserialize, Serialize};

/// Multipart field carrying the recorded audio.
const AUDIO_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub conversation: Vec<ConversationTurn>,
}

pub async fn health() -> &'static str {
    "OK"
}

/// Recorder page; names the voice the replies will use.
pub async fn index(State(state): State<AppState>) -> Html<String> {
    const INDEX: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/static/index.html"));
    Html(INDEX.replace("{{voice}}", &html_escape(state.orchestrator.voice_name())))
}

/// The voice name comes from config or the provider catalog.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// POST /transcribe: multipart `file` → `{"text"}`.
pub async fn transcribe(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let audio = read_audio_field(multipart).await?;
    let text = state.orchestrator.transcribe_upload(&audio).await?;
    Ok(Json(TranscriptResponse { text }))
}

/// POST /conversation: multipart `file` → `{"text", "audio"}`.
pub async fn conversation(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ReplyResult>, ApiError> {
    let audio = read_audio_field(multipart).await?;
    let reply = state.orchestrator.respond_to_audio(&audio).await?;
    Ok(Json(reply))
}

/// POST /ask: `{"conversation": [...]}` → `{"text", "audio"}`. The body is parsed as JSON
/// whatever its content type.
pub async fn ask(State(state): State<AppState>, body: Bytes) -> Result<Json<ReplyResult>, ApiError> {
    let request: AskRequest = if body.is_empty() {
        AskRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::bad_request(format!("Invalid JSON payload: {e}")))?
    };
    let reply = state.orchestrator.respond(&request.conversation).await?;
    Ok(Json(reply))
}

/// GET /listen/:id: the MP3 for a previously returned reply.
pub async fn listen(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = state.orchestrator.open_output(&id).await?;
    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], bytes))
}

/// Bytes of the `file` field. A missing field, or a body that is not multipart at all,
/// is `NoFileProvided`.
async fn read_audio_field(multipart: Result<Multipart, MultipartRejection>) -> Result<Bytes, ApiError> {
    let mut multipart = multipart.map_err(|_| ApiError::from(VoiceError::NoFileProvided))?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed reading multipart field: {e}")))?
    {
        if field.name() == Some(AUDIO_FIELD) {
            return field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed reading multipart '{AUDIO_FIELD}' field: {e}")));
        }
    }
    Err(VoiceError::NoFileProvided.into())
}
