use axum::http::StatusCode;
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Why a password reset code was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResetRejection {
    #[error("reset code not found")]
    NotFound,
    #[error("reset code expired")]
    Expired,
    #[error("reset code already used")]
    AlreadyUsed,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid {field}: {reason}")]
    ValidationFailed { field: &'static str, reason: String },
    #[error("Insufficient privileges")]
    InsufficientPrivileges,
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error("{entity} already exists: {key}")]
    Conflict { entity: &'static str, key: String },
    #[error("Token not found")]
    TokenNotFound,
    #[error("Token expired")]
    TokenExpired,
    #[error("Authorization code expired")]
    GrantExpired,
    #[error("Invalid client")]
    InvalidClient,
    #[error("Redirect URI mismatch")]
    InvalidRedirectUri,
    #[error("Invalid scope")]
    InvalidScope,
    #[error("Too many failed attempts")]
    RateLimited,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Password reset rejected: {0}")]
    ResetRejected(ResetRejection),
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Storage error: {0}")]
    Database(#[from] DbErr),
}

impl AuthError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        AuthError::ValidationFailed {
            field,
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        AuthError::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// Storage/hashing failures that are not part of the recoverable taxonomy.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AuthError::Database(_) | AuthError::Hashing(_))
    }

    /// HTTP status class callers should surface.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::ValidationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::InsufficientPrivileges => StatusCode::FORBIDDEN,
            AuthError::NotFound { .. } => StatusCode::NOT_FOUND,
            AuthError::Conflict { .. } => StatusCode::CONFLICT,
            AuthError::TokenNotFound | AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
            AuthError::InvalidClient | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::GrantExpired
            | AuthError::InvalidRedirectUri
            | AuthError::InvalidScope
            | AuthError::ResetRejected(_) => StatusCode::BAD_REQUEST,
            AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Hashing(_) | AuthError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// OAuth2 (RFC 6749 §5.2 / RFC 6750 §3.1) error code for the wire.
    pub fn oauth2_error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidClient => "invalid_client",
            AuthError::GrantExpired | AuthError::InvalidRedirectUri => "invalid_grant",
            AuthError::NotFound { entity: "grant", .. } => "invalid_grant",
            AuthError::ValidationFailed {
                field: "code_verifier",
                ..
            } => "invalid_grant",
            AuthError::InvalidScope => "invalid_scope",
            AuthError::TokenNotFound | AuthError::TokenExpired => "invalid_token",
            AuthError::InsufficientPrivileges | AuthError::InvalidCredentials => "access_denied",
            AuthError::RateLimited => "temporarily_unavailable",
            AuthError::Hashing(_) | AuthError::Database(_) => "server_error",
            _ => "invalid_request",
        }
    }
}

/// Map a unique-constraint violation to `Conflict`, leaving other errors fatal.
pub(crate) fn conflict_on_unique(err: DbErr, entity: &'static str, key: &str) -> AuthError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AuthError::Conflict {
            entity,
            key: key.to_string(),
        },
        _ => AuthError::Database(err),
    }
}
