//! # Error Handling
//!
//! Unified error taxonomy for the connect service, rendered as
//! problem+json responses with correlation IDs.

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::crypto::CryptoError;
use crate::cursor::CursorError;

/// Domain error for every connect/connector operation.
///
/// Connectors never swallow backend errors: anything the remote CRM
/// answers with a status >= 400 is carried through as [`ConnectError::Backend`],
/// except a 404 on a get-by-id which becomes [`ConnectError::NotFound`].
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Missing or empty required field. Not retried.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Consumer, integration, or remote record absent. Not retried.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad OAuth state, failed code exchange, or failed token refresh.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Remote CRM returned an error status other than a retried 401.
    #[error("backend returned status {status}: {message}")]
    Backend { status: u16, message: String },

    /// Secret could not be encrypted. Implies key misconfiguration.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Ciphertext could not be decrypted. Implies key misconfiguration
    /// or corrupted data; never silently swallowed.
    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ConnectError {
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound(message.into())
    }

    pub fn auth<S: Into<String>>(message: S) -> Self {
        Self::Auth(message.into())
    }

    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        Self::Backend {
            status,
            message: message.into(),
        }
    }

    /// HTTP status this error maps to at the API boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Backend { .. } => StatusCode::BAD_GATEWAY,
            Self::Encryption(_) | Self::Decryption(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable error code for programmatic handling (SCREAMING_SNAKE_CASE).
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "VALIDATION_FAILED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Auth(_) => "AUTH_FAILED",
            Self::Backend { .. } => "BACKEND_ERROR",
            Self::Encryption(_) | Self::Decryption(_) => "CRYPTO_ERROR",
            Self::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

/// Serialized problem+json body.
#[derive(Debug, Serialize)]
struct ProblemBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    trace_id: String,
}

/// Correlation ID for basic client-server log correlation.
fn correlation_id() -> String {
    format!("corr-{}", &uuid::Uuid::new_v4().to_string()[..8])
}

impl IntoResponse for ConnectError {
    fn into_response(self) -> Response {
        let trace_id = correlation_id();

        // Crypto failures are loud: they imply a misconfigured key, not bad input.
        match &self {
            ConnectError::Encryption(msg) | ConnectError::Decryption(msg) => {
                tracing::error!(trace_id = %trace_id, error = %msg, "credential crypto failure");
            }
            ConnectError::Internal(msg) => {
                tracing::error!(trace_id = %trace_id, error = %msg, "internal error");
            }
            _ => {
                tracing::debug!(trace_id = %trace_id, error = %self, "request failed");
            }
        }

        let details = match &self {
            ConnectError::Backend { status, message } => Some(json!({
                "backend_status": status,
                "backend_message": message,
            })),
            _ => None,
        };

        let body = ProblemBody {
            code: self.error_code(),
            message: match &self {
                // Never leak crypto internals to API clients.
                ConnectError::Encryption(_) | ConnectError::Decryption(_) => {
                    "credential processing failed".to_string()
                }
                ConnectError::Internal(_) => "an internal error occurred".to_string(),
                other => other.to_string(),
            },
            details,
            trace_id,
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        (self.status_code(), headers, axum::Json(body)).into_response()
    }
}

impl From<CryptoError> for ConnectError {
    fn from(error: CryptoError) -> Self {
        match error {
            CryptoError::EncryptionFailed(msg) => Self::Encryption(msg),
            other => Self::Decryption(other.to_string()),
        }
    }
}

impl From<CursorError> for ConnectError {
    fn from(error: CursorError) -> Self {
        Self::InvalidArgument(error.to_string())
    }
}

impl From<sea_orm::DbErr> for ConnectError {
    fn from(error: sea_orm::DbErr) -> Self {
        match error {
            sea_orm::DbErr::RecordNotFound(record) => {
                Self::NotFound(format!("record not found: {}", record))
            }
            other => {
                tracing::error!(error = ?other, "database error");
                Self::Internal("database error occurred".to_string())
            }
        }
    }
}

impl From<anyhow::Error> for ConnectError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<ConnectError>() {
            Ok(connect_error) => connect_error,
            Err(other) => {
                tracing::error!(error = ?other, "internal error");
                Self::Internal(other.to_string())
            }
        }
    }
}

impl From<reqwest::Error> for ConnectError {
    fn from(error: reqwest::Error) -> Self {
        Self::Internal(format!("outbound request failed: {}", error))
    }
}

impl From<url::ParseError> for ConnectError {
    fn from(error: url::ParseError) -> Self {
        Self::Internal(format!("url construction failed: {}", error))
    }
}
