//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::attachment::Attachment;
use crate::classifier::ContentType;
use crate::request::ConversationTurn;
use crate::session::SessionId;
use crate::types::{GeneratedContent, GeneratedImage};
use crate::log_debug;

use super::AppState;
use super::error::ApiError;

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    pub content_type: ContentType,
    pub result: GeneratedContent,
}

impl From<GeneratedContent> for GenerationResponse {
    fn from(result: GeneratedContent) -> Self {
        Self {
            content_type: result.content_type(),
            result,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub session_id: SessionId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHistory {
    pub session_id: SessionId,
    pub history: Vec<ConversationTurn>,
}

#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    #[serde(default)]
    pub prompt: String,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// POST /api/generate
pub async fn generate(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<Json<GenerationResponse>> {
    let (prompt, attachment) = read_form(&state, multipart).await?;
    let result = state.orchestrator.generate_once(&prompt, attachment).await?;
    Ok(Json(result.into()))
}

/// POST /api/sessions
pub async fn create_session(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<SessionCreated>) {
    let session_id = state.orchestrator.start_session();
    (StatusCode::CREATED, Json(SessionCreated { session_id }))
}

/// GET /api/sessions/{id}
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionHistory>> {
    let session_id = SessionId::from(id);
    let history = state.orchestrator.session_history(&session_id)?;
    Ok(Json(SessionHistory {
        session_id,
        history,
    }))
}

/// DELETE /api/sessions/{id}
pub async fn close_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.orchestrator.close_session(&SessionId::from(id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/sessions/{id}/messages
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ApiResult<Json<GenerationResponse>> {
    let session_id = SessionId::from(id);
    let (prompt, attachment) = read_form(&state, multipart).await?;
    let result = state
        .orchestrator
        .send_message(&session_id, &prompt, attachment)
        .await?;
    Ok(Json(result.into()))
}

/// POST /api/images
pub async fn generate_image(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ImageRequest>,
) -> ApiResult<Json<GeneratedImage>> {
    if request.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("prompt is required".to_string()));
    }
    let image = state.orchestrator.generate_image(&request.prompt).await?;
    Ok(Json(image))
}

struct Upload {
    bytes: Vec<u8>,
    media_type: String,
    name: String,
}

/// Read the `prompt` and optional `file` fields, staging the file only once
/// the prompt is known to be present.
async fn read_form(
    state: &AppState,
    mut multipart: Multipart,
) -> ApiResult<(String, Option<Attachment>)> {
    let mut prompt = None;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("prompt") => prompt = Some(field.text().await?),
            Some("file") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let media_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await?;
                if !bytes.is_empty() {
                    upload = Some(Upload {
                        bytes: bytes.to_vec(),
                        media_type,
                        name,
                    });
                }
            }
            other => log_debug!("Ignoring multipart field {:?}", other),
        }
    }

    let prompt = prompt
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("prompt is required".to_string()))?;

    let attachment = match upload {
        Some(upload) => Some(
            Attachment::stage(
                &state.staging_dir,
                &upload.bytes,
                upload.media_type,
                upload.name,
            )
            .await
            .map_err(|e| ApiError::Internal(format!("failed to stage upload: {e}")))?,
        ),
        None => None,
    };

    Ok((prompt, attachment))
}
