//! Error types and their mapping to HTTP responses.
//!
//! Every handler returns `Result<T, AppError>`. Server-side failures are logged
//! here and answered with a generic message; driver errors never reach clients.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::password::PasswordError;

/// Startup-time configuration failure. Never produced while serving requests.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("environment variable {0} must not be empty")]
    Empty(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Gate failures. `Invalid` covers bad credentials as well as missing, malformed,
/// forged or expired tokens, and deliberately carries no reason.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credentials")]
    Invalid,
    #[error("forbidden")]
    Forbidden,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated")]
    Conflict,
    #[error("referenced record does not exist")]
    InvalidReference,
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Database(sqlx::Error),
}

impl StoreError {
    /// Constraint violations the caller can act on; anything else stays a driver error.
    fn from_kind(kind: sqlx::error::ErrorKind) -> Option<Self> {
        match kind {
            sqlx::error::ErrorKind::UniqueViolation => Some(Self::Conflict),
            sqlx::error::ErrorKind::ForeignKeyViolation => Some(Self::InvalidReference),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if let Some(mapped) = Self::from_kind(db.kind()) {
                return mapped;
            }
        }
        Self::Database(e)
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// A role gate ran on a route without the token gate in front of it.
    #[error("identity missing from request context")]
    MissingIdentity,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<PasswordError> for AppError {
    fn from(e: PasswordError) -> Self {
        match e {
            PasswordError::InvalidInput => Self::Validation(e.to_string()),
            PasswordError::Hash(_) => Self::Internal(anyhow::Error::new(e)),
        }
    }
}

// Extractor rejections become JSON 400s. The serde detail is logged, not returned.

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "rejected request body");
        let message = match rejection {
            JsonRejection::MissingJsonContentType(_) => "expected an application/json body",
            JsonRejection::JsonSyntaxError(_) => "request body is not valid JSON",
            JsonRejection::JsonDataError(_) => "request body has missing or mistyped fields",
            _ => "unreadable request body",
        };
        Self::Validation(message.into())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "rejected query string");
        Self::Validation("invalid query parameters".into())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "rejected path parameter");
        Self::Validation("invalid path parameter".into())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth(AuthError::Invalid) => StatusCode::UNAUTHORIZED,
            Self::Auth(AuthError::Forbidden) => StatusCode::FORBIDDEN,
            Self::Store(StoreError::Conflict) => StatusCode::CONFLICT,
            Self::Store(StoreError::InvalidReference) | Self::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Store(StoreError::Corrupt(_) | StoreError::Database(_))
            | Self::MissingIdentity
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({ "error": message }));
        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}
