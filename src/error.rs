//! Error taxonomy for the orchestration core.
//!
//! Every core operation returns [`ForgeError`] so the boundary (HTTP server,
//! CLI) can map failures to caller-visible responses without string matching.

use std::fmt;
use std::path::PathBuf;

use crate::classifier::ContentType;
use crate::session::SessionId;

/// Result alias used throughout the core.
pub type Result<T, E = ForgeError> = std::result::Result<T, E>;

/// Transient upstream failure kinds, the only ones worth waiting out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    /// HTTP 429 / `RESOURCE_EXHAUSTED`
    RateLimited,
    /// HTTP 503 / `UNAVAILABLE`
    Unavailable,
}

impl fmt::Display for UpstreamErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate limited"),
            Self::Unavailable => write!(f, "service unavailable"),
        }
    }
}

/// Errors produced by the orchestration core.
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    #[error("Upstream {kind} (status {status}): {message}")]
    TransientUpstream {
        kind: UpstreamErrorKind,
        status: u16,
        message: String,
    },

    #[error("Upstream request failed{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    PermanentUpstream {
        /// HTTP status, absent for transport-level failures
        status: Option<u16>,
        message: String,
    },

    #[error("Unknown session: {0}")]
    UnknownSession(SessionId),

    #[error("Attachment no longer staged at {}", .0.display())]
    AttachmentMissing(PathBuf),

    #[error("Failed to read attachment {}: {source}", .path.display())]
    AttachmentIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Model output does not match the {content_type} schema: {reason}")]
    MalformedModelOutput {
        content_type: ContentType,
        reason: String,
        raw: String,
    },

    #[error("Model response contained no image data")]
    MissingImageData,

    #[error("Missing configuration: {0}")]
    ConfigurationMissing(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ForgeError {
    /// Whether the failure may resolve by retrying after a delay.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientUpstream { .. })
    }

    /// Short stable tag for logs and API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TransientUpstream { .. } => "transient_upstream",
            Self::PermanentUpstream { .. } => "permanent_upstream",
            Self::UnknownSession(_) => "unknown_session",
            Self::AttachmentMissing(_) => "attachment_missing",
            Self::AttachmentIo { .. } => "attachment_io",
            Self::MalformedModelOutput { .. } => "malformed_model_output",
            Self::MissingImageData => "missing_image_data",
            Self::ConfigurationMissing(_) => "configuration_missing",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }

    pub(crate) fn permanent(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::PermanentUpstream {
            status,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_upstream_throttling_is_transient() {
        let throttled = ForgeError::TransientUpstream {
            kind: UpstreamErrorKind::RateLimited,
            status: 429,
            message: "slow down".to_string(),
        };
        assert!(throttled.is_transient());
        assert!(!ForgeError::permanent(Some(400), "bad request").is_transient());
        assert!(!ForgeError::MissingImageData.is_transient());
    }

    #[test]
    fn test_permanent_error_display_includes_status_when_known() {
        let with_status = ForgeError::permanent(Some(403), "forbidden");
        assert_eq!(
            with_status.to_string(),
            "Upstream request failed (status 403): forbidden"
        );

        let transport = ForgeError::permanent(None, "connection reset");
        assert_eq!(
            transport.to_string(),
            "Upstream request failed: connection reset"
        );
    }
}
