//! Orchestration façade: classify, resolve, build, invoke, validate.

use std::sync::Arc;

use crate::attachment::Attachment;
use crate::classifier::{ContentType, classify, classify_among};
use crate::client::{GenerateContentResponse, GenerativeModel};
use crate::error::{ForgeError, Result};
use crate::request::{self, ConversationTurn, ModelSettings, RequestPayload};
use crate::retry::{self, RetryPolicy};
use crate::schema::{self, ResolvedSchema};
use crate::session::{SessionId, SessionStore};
use crate::types::{GeneratedContent, GeneratedImage};
use crate::{log_debug, log_info, log_warn};

/// Content types a conversation may produce besides `default`
pub const DEFAULT_SESSION_CONTENT_TYPES: &[ContentType] =
    &[ContentType::Presentation, ContentType::Document];

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub model: ModelSettings,
    pub retry: RetryPolicy,
    pub session_content_types: Vec<ContentType>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            model: ModelSettings::default(),
            retry: RetryPolicy::default(),
            session_content_types: DEFAULT_SESSION_CONTENT_TYPES.to_vec(),
        }
    }
}

/// Entry point for every generation path
pub struct Orchestrator {
    model: Arc<dyn GenerativeModel>,
    sessions: Arc<dyn SessionStore>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        sessions: Arc<dyn SessionStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            model,
            sessions,
            settings,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// One-shot structured generation. Touches no session state.
    #[tracing::instrument(
        skip_all,
        fields(prompt_chars = prompt.len(), attachment = attachment.is_some())
    )]
    pub async fn generate_once(
        &self,
        prompt: &str,
        attachment: Option<Attachment>,
    ) -> Result<GeneratedContent> {
        let prompt = require_prompt(prompt)?;
        let resolved = schema::resolve(classify(prompt), prompt);
        log_info!(
            "Generating {} (schema {})",
            resolved.content_type,
            resolved.schema.name
        );

        let built =
            request::build(prompt, &resolved, attachment, None, &self.settings.model).await?;
        let response = self.invoke(&built.payload).await?;
        parse_response(&resolved, &response)
    }

    pub fn start_session(&self) -> SessionId {
        self.sessions.create()
    }

    pub fn close_session(&self, id: &SessionId) -> Result<()> {
        self.sessions.close(id)
    }

    pub fn session_history(&self, id: &SessionId) -> Result<Vec<ConversationTurn>> {
        self.sessions.get(id)
    }

    /// Generate within a conversation, extending its history on success.
    #[tracing::instrument(
        skip_all,
        fields(session = %id, prompt_chars = prompt.len(), attachment = attachment.is_some())
    )]
    pub async fn send_message(
        &self,
        id: &SessionId,
        prompt: &str,
        attachment: Option<Attachment>,
    ) -> Result<GeneratedContent> {
        let prompt = require_prompt(prompt)?;
        let history = self.sessions.get(id)?;

        let content_type = classify_among(prompt, &self.settings.session_content_types);
        let resolved = schema::resolve(content_type, prompt);
        log_info!(
            "Session {}: generating {} with {} prior turns",
            id,
            resolved.content_type,
            history.len()
        );

        let built = request::build(
            prompt,
            &resolved,
            attachment,
            Some(&history),
            &self.settings.model,
        )
        .await?;
        let response = self.invoke(&built.payload).await?;
        let content = parse_response(&resolved, &response)?;

        self.sessions
            .append_exchange(id, built.user_turn, response.model_turn())?;
        Ok(content)
    }

    /// Generate an image. No schema, no history.
    #[tracing::instrument(skip_all, fields(prompt_chars = prompt.len()))]
    pub async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage> {
        let prompt = require_prompt(prompt)?;
        let payload = request::build_image_request(prompt, &self.settings.model);
        log_info!("Generating image with {}", payload.model);

        let response = self.invoke(&payload).await?;
        let blob = response.inline_data().ok_or(ForgeError::MissingImageData)?;
        log_debug!("Received {} image ({} base64 chars)", blob.mime_type, blob.data.len());

        Ok(GeneratedImage {
            mime_type: blob.mime_type.clone(),
            data: blob.data.clone(),
        })
    }

    async fn invoke(&self, payload: &RequestPayload) -> Result<GenerateContentResponse> {
        retry::invoke(&self.settings.retry, || self.model.generate_content(payload)).await
    }
}

fn require_prompt(prompt: &str) -> Result<&str> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(ForgeError::InvalidRequest("prompt must not be empty".to_string()));
    }
    Ok(trimmed)
}

fn parse_response(
    resolved: &ResolvedSchema,
    response: &GenerateContentResponse,
) -> Result<GeneratedContent> {
    schema::parse(resolved.content_type, &response.text()).inspect_err(|e| {
        if let ForgeError::MalformedModelOutput { reason, raw, .. } = e {
            log_warn!(
                "Malformed {} output against schema {}: {} (raw: {} chars)",
                resolved.content_type,
                resolved.schema.name,
                reason,
                raw.len()
            );
        }
    })
}
