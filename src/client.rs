//! Remote generative model client.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ForgeError, Result, UpstreamErrorKind};
use crate::log_debug;
use crate::request::{Blob, ConversationTurn, Part, RequestPayload, Role};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A model that answers `generateContent` requests
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate_content(&self, payload: &RequestPayload) -> Result<GenerateContentResponse>;
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: CandidateContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
    #[serde(default)]
    pub total_token_count: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
}

/// Response body of `generateContent`
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    /// Response carrying a single text part
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::from_parts(vec![Part::text(text)])
    }

    pub fn from_parts(parts: Vec<Part>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: CandidateContent {
                    role: Some(Role::Model),
                    parts,
                },
                finish_reason: Some("STOP".to_string()),
            }],
            ..Self::default()
        }
    }

    fn first_parts(&self) -> &[Part] {
        self.candidates
            .first()
            .map(|c| c.content.parts.as_slice())
            .unwrap_or_default()
    }

    /// Text parts of the first candidate, concatenated
    pub fn text(&self) -> String {
        self.first_parts()
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect()
    }

    /// First inline binary part of the first candidate
    pub fn inline_data(&self) -> Option<&Blob> {
        self.first_parts().iter().find_map(|p| p.inline_data.as_ref())
    }

    /// The model turn to keep in a transcript
    pub fn model_turn(&self) -> ConversationTurn {
        ConversationTurn::model(self.text())
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Map a non-success HTTP response to the error taxonomy.
pub fn classify_failure(status: StatusCode, body: &str) -> ForgeError {
    let (message, api_status) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.status),
        Err(_) => (body.trim().to_string(), String::new()),
    };
    let message = if message.is_empty() {
        status.canonical_reason().unwrap_or("unknown error").to_string()
    } else {
        message
    };

    let kind = if status == StatusCode::TOO_MANY_REQUESTS || api_status == "RESOURCE_EXHAUSTED" {
        Some(UpstreamErrorKind::RateLimited)
    } else if status == StatusCode::SERVICE_UNAVAILABLE || api_status == "UNAVAILABLE" {
        Some(UpstreamErrorKind::Unavailable)
    } else {
        None
    };

    match kind {
        Some(kind) => ForgeError::TransientUpstream {
            kind,
            status: status.as_u16(),
            message,
        },
        None => ForgeError::permanent(Some(status.as_u16()), message),
    }
}

/// Gemini REST client
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_options(api_key, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_options(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ForgeError::ConfigurationMissing(
                "Gemini API key".to_string(),
            ));
        }

        let base_url = base_url.into();
        let parsed = Url::parse(&base_url).map_err(|e| {
            ForgeError::ConfigurationMissing(format!("valid Gemini base URL ({base_url}: {e})"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ForgeError::ConfigurationMissing(format!(
                "http(s) Gemini base URL, got {base_url}"
            )));
        }

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| ForgeError::permanent(None, format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate_content(&self, payload: &RequestPayload) -> Result<GenerateContentResponse> {
        let url = self.endpoint(&payload.model);
        log_debug!(
            "POST {} ({} turns)",
            url,
            payload.request.contents.len()
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload.request)
            .send()
            .await
            .map_err(|e| ForgeError::permanent(None, format!("transport error: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ForgeError::permanent(Some(status.as_u16()), format!("failed to read body: {e}")))?;

        if !status.is_success() {
            return Err(classify_failure(status, &body));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            ForgeError::permanent(Some(status.as_u16()), format!("undecodable response body: {e}"))
        })?;

        if let Some(usage) = &parsed.usage_metadata {
            log_debug!(
                "Token usage: prompt={} candidates={} total={}",
                usage.prompt_token_count,
                usage.candidates_token_count,
                usage.total_token_count
            );
        }
        if let Some(reason) = parsed
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return Err(ForgeError::permanent(
                Some(status.as_u16()),
                format!("prompt blocked: {reason}"),
            ));
        }

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_status_is_transient() {
        let err = classify_failure(StatusCode::TOO_MANY_REQUESTS, "");
        assert!(matches!(
            err,
            ForgeError::TransientUpstream {
                kind: UpstreamErrorKind::RateLimited,
                status: 429,
                ..
            }
        ));
    }

    #[test]
    fn test_error_body_status_is_honoured() {
        let body = r#"{"error":{"code":500,"message":"overloaded","status":"UNAVAILABLE"}}"#;
        let err = classify_failure(StatusCode::INTERNAL_SERVER_ERROR, body);
        match err {
            ForgeError::TransientUpstream { kind, message, .. } => {
                assert_eq!(kind, UpstreamErrorKind::Unavailable);
                assert_eq!(message, "overloaded");
            }
            other => panic!("expected transient, got {other:?}"),
        }
    }

    #[test]
    fn test_other_statuses_are_permanent() {
        for status in [StatusCode::BAD_REQUEST, StatusCode::UNAUTHORIZED, StatusCode::INTERNAL_SERVER_ERROR] {
            assert!(!classify_failure(status, "nope").is_transient());
        }
    }

    #[test]
    fn test_response_accessors() {
        let response = GenerateContentResponse::from_parts(vec![
            Part::text("{\"a\":"),
            Part::text("1}"),
            Part::inline(Blob {
                mime_type: "image/png".to_string(),
                data: "AA==".to_string(),
            }),
        ]);
        assert_eq!(response.text(), "{\"a\":1}");
        assert_eq!(
            response.inline_data().map(|b| b.mime_type.as_str()),
            Some("image/png")
        );
        assert_eq!(GenerateContentResponse::default().text(), "");
        assert!(GenerateContentResponse::default().inline_data().is_none());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let client = GeminiClient::new("secret-key-123").expect("client");
        let debug = format!("{client:?}");
        assert!(!debug.contains("secret-key-123"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(GeminiClient::with_options("k", "not a url", DEFAULT_REQUEST_TIMEOUT).is_err());
        assert!(GeminiClient::with_options("k", "ftp://example.com", DEFAULT_REQUEST_TIMEOUT).is_err());
        let client = GeminiClient::with_options("k", "http://localhost:9/v1beta/", DEFAULT_REQUEST_TIMEOUT)
            .expect("client");
        assert_eq!(client.base_url(), "http://localhost:9/v1beta");
    }

    #[test]
    fn test_empty_api_key_is_rejected() {
        assert!(matches!(
            GeminiClient::new("  "),
            Err(ForgeError::ConfigurationMissing(_))
        ));
    }
}
