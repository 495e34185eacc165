//! Unified error handling for the REST surface.
//!
//! Every handler returns `Result<_, ApiError>`; the `IntoResponse` impl
//! maps each variant to a status code and a JSON body with a stable
//! machine-readable `error` code, which doubles as the metrics label.

use crate::db::DbError;
use crate::uploads::UploadError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to API clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing or invalid bearer token")]
    Unauthorized,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("upload incomplete: expected {expected} chunks, received {received}")]
    UploadIncomplete { expected: u32, received: u32 },

    #[error(transparent)]
    Upload(UploadError),

    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl ApiError {
    /// Stable machine-readable code, also used as metrics label.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::InvalidCredentials => "invalid_credentials",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::RateLimited => "rate_limited",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::UploadIncomplete { .. } => "upload_incomplete",
            Self::Upload(e) => match e {
                UploadError::MissingChunk(_) => "upload_incomplete",
                UploadError::SizeMismatch { .. } => "size_mismatch",
                UploadError::DigestMismatch { .. } => "digest_mismatch",
                UploadError::AssemblyInProgress => "assembly_in_progress",
                UploadError::Io(_) => "internal_error",
            },
            Self::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UploadIncomplete { .. } => StatusCode::CONFLICT,
            Self::Upload(e) => match e {
                UploadError::MissingChunk(_) => StatusCode::CONFLICT,
                UploadError::SizeMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                UploadError::DigestMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                UploadError::AssemblyInProgress => StatusCode::CONFLICT,
                UploadError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal errors get logged with detail but reported opaquely.
        let message = match &self {
            Self::Internal(source) => {
                tracing::error!(error = %source, "internal error serving request");
                "internal error".to_string()
            }
            Self::Upload(UploadError::Io(source)) => {
                tracing::error!(error = %source, "upload io error");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: self.error_code(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::UserExists(name) => {
                Self::Conflict(format!("username already taken: {name}"))
            }
            DbError::EmailExists(email) => {
                Self::Conflict(format!("email already registered: {email}"))
            }
            DbError::SubjectExists(name) => {
                Self::Conflict(format!("subject already exists: {name}"))
            }
            DbError::UserNotFound(_) | DbError::InvalidCredentials => Self::InvalidCredentials,
            DbError::Sqlx(_) | DbError::Migration(_) | DbError::Internal(_) => {
                Self::Internal(anyhow::Error::new(err))
            }
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        Self::Upload(err)
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(ApiError::Unauthorized.error_code(), "unauthorized");
        assert_eq!(ApiError::NotFound("note").error_code(), "not_found");
        assert_eq!(
            ApiError::Upload(UploadError::MissingChunk(3)).error_code(),
            "upload_incomplete"
        );
    }

    #[test]
    fn db_conflicts_map_to_409() {
        let err: ApiError = DbError::UserExists("alice".into()).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: ApiError = DbError::InvalidCredentials.into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn upload_errors_map_to_client_statuses() {
        let err: ApiError = UploadError::SizeMismatch {
            expected: 10,
            actual: 5,
        }
        .into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err: ApiError = UploadError::MissingChunk(0).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }
}
