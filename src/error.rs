use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::{
    dao::storage::StoreError,
    services::{answer_validator::InvalidAnswerOption, setup_readiness::ReadinessReport},
    state::state_machine::{InvalidTransition, TransitionError},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Store backend failed or is unreachable.
    #[error("store unavailable")]
    Unavailable(#[source] StoreError),
    /// Store rules rejected this identity.
    #[error("permission denied on `{0}`")]
    PermissionDenied(String),
    /// Application is running without a store.
    #[error("store unavailable (degraded mode)")]
    Degraded,
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error(transparent)]
    InvalidAnswer(#[from] InvalidAnswerOption),
    /// The match moved on since the caller (or this attempt) observed it.
    #[error("stale write: observed {observed}, store holds {actual}")]
    StaleWrite { observed: i64, actual: i64 },
    #[error("setup incomplete: {}", .0.summary)]
    SetupIncomplete(Box<ReadinessReport>),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
    #[error("failed to encode payload")]
    Encode(#[from] serde_json::Error),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PermissionDenied { path } => ServiceError::PermissionDenied(path),
            other => ServiceError::Unavailable(other),
        }
    }
}

impl From<TransitionError> for ServiceError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::InvalidTransition(invalid) => ServiceError::InvalidTransition(invalid),
            TransitionError::InvalidAnswer(invalid) => ServiceError::InvalidAnswer(invalid),
            TransitionError::SetupIncomplete(report) => ServiceError::SetupIncomplete(report),
            unavailable @ TransitionError::QuestionUnavailable { .. } => {
                ServiceError::NotFound(unavailable.to_string())
            }
        }
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Missing or unknown host identity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The store refused the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Setup checks failed; the report travels in the body.
    #[error("conflict: {}", .0.summary)]
    SetupIncomplete(Box<ReadinessReport>),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Timeout => AppError::ServiceUnavailable("operation timed out".into()),
            ServiceError::PermissionDenied(path) => AppError::Forbidden(path),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            err @ ServiceError::InvalidAnswer(_) => AppError::BadRequest(err.to_string()),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            err @ (ServiceError::InvalidTransition(_) | ServiceError::StaleWrite { .. }) => {
                AppError::Conflict(err.to_string())
            }
            ServiceError::SetupIncomplete(report) => AppError::SetupIncomplete(report),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            err @ ServiceError::Encode(_) => AppError::Internal(err.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::SetupIncomplete(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let details = match &self {
            AppError::SetupIncomplete(report) => serde_json::to_value(report).ok(),
            _ => None,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
            details,
        });

        (status, payload).into_response()
    }
}
