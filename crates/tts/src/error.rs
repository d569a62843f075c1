use axum::{
    Json,
    http::{StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use config::LimitKey;
use rate_limit::RateLimitError;
use serde::Serialize;
use thiserror::Error;

use crate::provider::SynthesisError;

/// Voice endpoint errors with appropriate HTTP status codes.
#[derive(Debug, Error)]
pub enum TtsError {
    /// The request body is well-formed JSON but not a valid synthesis request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A rate limit tier rejected the request.
    #[error("Rate limit exceeded for tier {limit}, retry after {retry_after} seconds")]
    RateLimited {
        /// The first tier that rejected the request.
        limit: LimitKey,
        /// Whole seconds until the tier's window resets.
        retry_after: u64,
    },

    /// The synthesis backend failed.
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
}

impl From<RateLimitError> for TtsError {
    fn from(error: RateLimitError) -> Self {
        match error {
            RateLimitError::LimitExceeded { limit, retry_after } => Self::RateLimited { limit, retry_after },
        }
    }
}

impl TtsError {
    /// Get the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Synthesis(SynthesisError::Provider { .. } | SynthesisError::Connection(_)) => StatusCode::BAD_GATEWAY,
            Self::Synthesis(SynthesisError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type string for the response.
    pub fn error_type(&self) -> &str {
        match self {
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::RateLimited { .. } => "rate_limit_error",
            Self::Synthesis(SynthesisError::Provider { .. } | SynthesisError::Connection(_)) => "api_error",
            Self::Synthesis(SynthesisError::Internal(_)) => "internal_error",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorDetails,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetails {
    message: String,
    r#type: String,
    code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<LimitKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl IntoResponse for TtsError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            log::error!("Server error ({}): {}", status.as_u16(), self);
        }

        let message = match &self {
            Self::Synthesis(SynthesisError::Internal(_)) => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        let (limit, retry_after) = match &self {
            Self::RateLimited { limit, retry_after } => (Some(*limit), Some(*retry_after)),
            _ => (None, None),
        };

        let body = Json(ErrorResponse {
            error: ErrorDetails {
                message,
                r#type: self.error_type().to_string(),
                code: status.as_u16(),
                limit,
                retry_after,
            },
        });

        match retry_after {
            Some(seconds) => (status, [(RETRY_AFTER, seconds.to_string())], body).into_response(),
            None => (status, body).into_response(),
        }
    }
}
