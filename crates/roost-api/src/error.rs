use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bson::oid::ObjectId;
use roost_types::api::Envelope;
use thiserror::Error;
use tracing::error;

/// Everything a handler can fail with, mapped onto the wire contract: a
/// status code plus `{"success": false, "error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Caller mistake in the request itself: malformed id, empty text,
    /// unparseable date, self-targeting.
    #[error("{0}")]
    Validation(String),

    /// Missing or unusable credential.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated, but this resource belongs to someone else.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Unique-constraint clash, e.g. a taken username or email.
    #[error("{0}")]
    Conflict(String),

    /// Storage failure or anything else unanticipated. The cause is logged
    /// server-side and never shown to the client.
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(cause) = &self {
            error!("internal error: {cause:#}");
        }

        let status = self.status_code();
        let body = Json(Envelope::err(self.to_string()));
        (status, body).into_response()
    }
}

/// Parse an id supplied in a path or body, turning failure into the
/// caller-mistake branch of the taxonomy with a resource-specific message.
pub fn parse_object_id(raw: &str, what: &str) -> Result<ObjectId, ApiError> {
    raw.parse::<ObjectId>()
        .map_err(|_| ApiError::validation(format!("Invalid {what}")))
}
