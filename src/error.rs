// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::{models::submission::Submission, store::StoreError};

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 422 Unprocessable Entity: caller may not start this quiz
    NotEligible(String),

    // 409 Conflict: lifecycle state violations
    AlreadyInProgress,
    AlreadyAttempted,
    NotInProgress,
    /// Carries the frozen result so retries can still show it.
    AlreadyCompleted(Box<Submission>),

    // 403 Forbidden, rendered without detail
    Forbidden,

    // 404 Not Found, rendered without detail
    NotFound,

    // 400 Bad Request
    ValidationError(String),

    // 401 Unauthorized
    AuthError(String),

    // 409 Conflict (e.g., duplicate username)
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),
}

impl AppError {
    /// Stable machine-readable kind, sent as `code` in error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotEligible(_) => "not_eligible",
            AppError::AlreadyInProgress => "already_in_progress",
            AppError::AlreadyAttempted => "already_attempted",
            AppError::NotInProgress => "not_in_progress",
            AppError::AlreadyCompleted(_) => "already_completed",
            AppError::Forbidden => "forbidden",
            AppError::NotFound => "not_found",
            AppError::ValidationError(_) => "validation_error",
            AppError::AuthError(_) => "unauthorized",
            AppError::Conflict(_) => "conflict",
            AppError::InternalServerError(_) => "internal_error",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotEligible(msg) => write!(f, "not eligible: {}", msg),
            AppError::AlreadyInProgress => write!(f, "submission already in progress"),
            AppError::AlreadyAttempted => write!(f, "quiz already attempted"),
            AppError::NotInProgress => write!(f, "submission is not in progress"),
            AppError::AlreadyCompleted(s) => write!(f, "submission {} already completed", s.id),
            AppError::Forbidden => write!(f, "forbidden"),
            AppError::NotFound => write!(f, "not found"),
            AppError::ValidationError(msg) => write!(f, "validation error: {}", msg),
            AppError::AuthError(msg) => write!(f, "unauthorized: {}", msg),
            AppError::Conflict(msg) => write!(f, "conflict: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, error_message, submission) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    None,
                )
            }
            AppError::NotEligible(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg, None),
            AppError::AlreadyInProgress => (
                StatusCode::CONFLICT,
                "A submission for this quiz is already in progress".to_string(),
                None,
            ),
            AppError::AlreadyAttempted => (
                StatusCode::CONFLICT,
                "You have already taken this quiz".to_string(),
                None,
            ),
            AppError::NotInProgress => (
                StatusCode::CONFLICT,
                "This submission is no longer accepting answers".to_string(),
                None,
            ),
            AppError::AlreadyCompleted(submission) => (
                StatusCode::CONFLICT,
                "This submission has already been completed".to_string(),
                Some(submission),
            ),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string(), None),
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not Found".to_string(), None),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
        };

        let body = match submission {
            Some(submission) => Json(json!({
                "error": error_message,
                "code": code,
                "submission": submission,
            })),
            None => Json(json!({
                "error": error_message,
                "code": code,
            })),
        };

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            StoreError::Transient(msg) | StoreError::Other(msg) => {
                AppError::InternalServerError(msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_and_not_found_hide_detail() {
        let forbidden = AppError::Forbidden.into_response();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let missing = AppError::NotFound.into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn lifecycle_errors_map_to_conflict() {
        for err in [
            AppError::AlreadyAttempted,
            AppError::AlreadyInProgress,
            AppError::NotInProgress,
        ] {
            assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
        }
        assert_eq!(
            AppError::NotEligible("closed".into()).into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn store_conflict_becomes_app_conflict() {
        let err: AppError = StoreError::Conflict("dup".into()).into();
        assert!(matches!(err, AppError::Conflict(ref m) if m == "dup"));

        let err: AppError = StoreError::Transient("deadlock".into()).into();
        assert_eq!(err.code(), "internal_error");
    }
}
