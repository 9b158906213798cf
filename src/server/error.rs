//! HTTP error mapping.

use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::ForgeError;
use crate::{log_error, log_warn};

/// Failure of an HTTP handler
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] ForgeError),

    /// Malformed request rejected before the core runs
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::BadRequest(format!("invalid multipart body: {}", err.body_text()))
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Core(err) => match err {
                ForgeError::UnknownSession(_) => StatusCode::NOT_FOUND,
                ForgeError::InvalidRequest(_)
                | ForgeError::AttachmentMissing(_)
                | ForgeError::AttachmentIo { .. } => StatusCode::BAD_REQUEST,
                ForgeError::TransientUpstream { .. } => StatusCode::SERVICE_UNAVAILABLE,
                ForgeError::PermanentUpstream { .. }
                | ForgeError::MalformedModelOutput { .. }
                | ForgeError::MissingImageData => StatusCode::BAD_GATEWAY,
                ForgeError::ConfigurationMissing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Core(err) => err.kind(),
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log_error!("{} -> {}: {}", self.kind(), status, self);
        } else {
            log_warn!("{} -> {}: {}", self.kind(), status, self);
        }

        let body = ErrorResponse {
            error: ErrorBody {
                kind: self.kind(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
