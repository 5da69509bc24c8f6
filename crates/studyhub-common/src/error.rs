//! Centralized error types for StudyHub.
//!
//! Uses `thiserror` for ergonomic error definitions and provides HTTP-friendly
//! error variants that can be directly converted to API responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Failures reported by the document store contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),

    /// A document read inside a transaction changed before commit.
    #[error("transaction conflict on {0}")]
    Conflict(String),

    #[error("permission denied on {0}")]
    PermissionDenied(String),

    #[error("batch of {size} operations exceeds the limit of {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("malformed document: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Failure sub-cases of the hosted authentication service's account delete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityFailure {
    /// The credential is too old for a sensitive operation.
    #[error("recent sign-in required")]
    RequiresRecentLogin,

    #[error("identity not found")]
    UserNotFound,

    #[error("too many requests")]
    TooManyRequests,

    #[error("identity service error: {0}")]
    Other(String),
}

/// Core application error type used across all StudyHub services.
#[derive(Debug, thiserror::Error)]
pub enum StudyHubError {
    // === Auth errors ===
    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthorized")]
    Unauthorized,

    // === Authorization errors ===
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    // === Resource errors ===
    #[error("{resource} not found")]
    NotFound { resource: String },

    // === State conflicts ===
    #[error("You are already a member of this community")]
    AlreadyMember,

    #[error("You already have a pending request to join this community")]
    RequestPending,

    #[error("This join request has already been reviewed")]
    AlreadyReviewed,

    #[error("Conflict: {message}")]
    Conflict { message: String },

    // === Validation errors ===
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Limit reached: {message}")]
    LimitReached { message: String },

    // === Infrastructure errors ===
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Identity service error: {0}")]
    Identity(IdentityFailure),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body sent to clients.
#[derive(Serialize)]
struct ErrorResponse {
    code: u16,
    error: String,
    message: String,
}

impl StudyHubError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Map error to HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidToken | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::AlreadyMember
            | Self::RequestPending
            | Self::AlreadyReviewed
            | Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::LimitReached { .. } => StatusCode::FORBIDDEN,
            Self::Identity(IdentityFailure::RequiresRecentLogin) => StatusCode::UNAUTHORIZED,
            Self::Identity(IdentityFailure::TooManyRequests) => StatusCode::TOO_MANY_REQUESTS,
            Self::Identity(IdentityFailure::UserNotFound) => StatusCode::NOT_FOUND,
            Self::Store(StoreError::PermissionDenied(_)) => StatusCode::FORBIDDEN,
            Self::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Store(_) | Self::Identity(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Error code string for programmatic handling by clients.
    pub fn error_code(&self) -> &str {
        match self {
            Self::InvalidToken => "INVALID_TOKEN",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyMember => "ALREADY_MEMBER",
            Self::RequestPending => "REQUEST_PENDING",
            Self::AlreadyReviewed => "ALREADY_REVIEWED",
            Self::Conflict { .. } => "CONFLICT",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::LimitReached { .. } => "LIMIT_REACHED",
            Self::Store(_) => "STORE_ERROR",
            Self::Identity(IdentityFailure::RequiresRecentLogin) => "REQUIRES_RECENT_LOGIN",
            Self::Identity(IdentityFailure::TooManyRequests) => "RATE_LIMITED",
            Self::Identity(_) => "IDENTITY_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for StudyHubError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't leak internal details to clients
        let message = match &self {
            StudyHubError::Store(e) => {
                tracing::error!("Store error: {e}");
                "An internal error occurred".to_string()
            }
            StudyHubError::Internal(e) => {
                tracing::error!("Internal error: {e}");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            code: status.as_u16(),
            error: self.error_code().to_string(),
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience type alias for Results using StudyHubError.
pub type StudyHubResult<T> = Result<T, StudyHubError>;
