//! Multimodal request assembly and the `generateContent` wire types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attachment::Attachment;
use crate::error::Result;
use crate::log_debug;
use crate::schema::ResolvedSchema;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.0-flash-preview-image-generation";

/// Speaker of a conversation turn
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// Inline binary payload
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    /// Base64-encoded bytes
    pub data: String,
}

/// One part of a turn: text or inline data
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn inline(blob: Blob) -> Self {
        Self {
            text: None,
            inline_data: Some(blob),
        }
    }
}

/// A single turn in a transcript
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::text(text)],
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::text(text)],
        }
    }

    /// All text parts joined with newlines
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Role-less content, used for the system instruction
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SystemContent {
    pub parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
}

/// Body of a `models/{model}:generateContent` call
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<ConversationTurn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<SystemContent>,
    pub generation_config: GenerationConfig,
}

/// Everything needed for one upstream call
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPayload {
    /// Target model identifier, e.g. `gemini-2.0-flash`
    pub model: String,
    pub request: GenerateContentRequest,
}

/// Model selection and sampling settings shared by all requests
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub model: String,
    pub image_model: String,
    pub temperature: Option<f32>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            temperature: None,
        }
    }
}

/// A built request plus the transcript form of its new user turn
#[derive(Debug, Clone)]
pub struct BuiltRequest {
    pub payload: RequestPayload,
    /// Text-only copy of the user turn, safe to keep in session history
    pub user_turn: ConversationTurn,
}

/// Assemble a structured-output request.
///
/// The attachment, if any, is consumed here: its staged file is read,
/// encoded and deleted before this returns, on success or failure.
pub async fn build(
    prompt: &str,
    resolved: &ResolvedSchema,
    attachment: Option<Attachment>,
    prior_history: Option<&[ConversationTurn]>,
    settings: &ModelSettings,
) -> Result<BuiltRequest> {
    let mut parts = vec![Part::text(prompt)];
    let mut transcript_parts = vec![Part::text(prompt)];

    if let Some(attachment) = attachment {
        let encoded = attachment.consume().await?;
        log_debug!(
            "Embedding attachment '{}' ({}, {} bytes)",
            encoded.original_name,
            encoded.blob.mime_type,
            encoded.size
        );
        transcript_parts.push(Part::text(encoded.transcript_note()));
        parts.push(Part::inline(encoded.blob));
    }

    let mut contents = prior_history.map(<[ConversationTurn]>::to_vec).unwrap_or_default();
    contents.push(ConversationTurn {
        role: Role::User,
        parts,
    });

    let request = GenerateContentRequest {
        contents,
        system_instruction: Some(SystemContent {
            parts: vec![Part::text(resolved.instruction.as_str())],
        }),
        generation_config: GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(resolved.schema.schema.clone()),
            temperature: settings.temperature,
            response_modalities: None,
        },
    };

    Ok(BuiltRequest {
        payload: RequestPayload {
            model: settings.model.clone(),
            request,
        },
        user_turn: ConversationTurn {
            role: Role::User,
            parts: transcript_parts,
        },
    })
}

/// Assemble an image generation request. No schema, no history.
pub fn build_image_request(prompt: &str, settings: &ModelSettings) -> RequestPayload {
    RequestPayload {
        model: settings.image_model.clone(),
        request: GenerateContentRequest {
            contents: vec![ConversationTurn::user(prompt)],
            system_instruction: None,
            generation_config: GenerationConfig {
                response_modalities: Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
                temperature: settings.temperature,
                ..GenerationConfig::default()
            },
        },
    }
}
