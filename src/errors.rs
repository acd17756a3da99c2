use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::services::credentials::CredentialError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        };

        let body = serde_json::json!({ "success": false, "message": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::NotAuthorized(_) => {
                AppError::Unauthorized("Authorization token required".to_string())
            }
            CredentialError::Storage(e) => AppError::Storage(e),
        }
    }
}

/// The completion response could not be read as a command envelope.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
#[error("failed to parse completion response ({reason}): {raw}")]
pub struct ParseError {
    pub raw: String,
    pub reason: String,
}

/// Failures of the command pipeline. None of these abort the process; each one
/// becomes an error `ActionResult`.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("no usable date or time in {0:?}")]
    AmbiguousDate(String),

    #[error("Could not determine service type: {0:?}")]
    UnknownService(String),

    #[error("Unknown {service} action: {action}")]
    UnknownAction { service: String, action: String },

    #[error("{0}")]
    Delegate(String),
}
