//! Application error taxonomy.
//!
//! One enum covers every failure a domain operation can surface. The HTTP
//! layer maps variants to status codes and stable error codes in
//! `server::response`; everything below the HTTP layer works with
//! [`AppResult`].

use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("start time must be before end time")]
    InvalidTimeRange,

    #[error("timezone must be a valid IANA name: {0}")]
    InvalidTimezone(String),

    #[error("recurrence rule did not parse: {0}")]
    InvalidRecurrenceRule(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("insufficient permission")]
    InsufficientPermission,

    #[error("only managers or admins may act on approvals")]
    NotApprover,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("resource not available for the requested time")]
    ResourceNotAvailable,

    #[error("reservation is already approved")]
    AlreadyApproved,

    #[error("reservation is already rejected")]
    AlreadyRejected,

    #[error("login state is missing, expired, or already used")]
    InvalidState,

    #[error("nonce mismatch in ID token")]
    InvalidNonce,

    #[error("at_hash claim does not match the access token")]
    InvalidAtHash,

    #[error("token is expired")]
    TokenExpired,

    #[error("token issuer mismatch")]
    InvalidIssuer,

    #[error("token audience mismatch")]
    InvalidAudience,

    #[error("token issued in the future")]
    FutureIssuedAt,

    #[error("session not found or expired")]
    SessionNotFound,

    #[error("too many requests")]
    TooManyRequests,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("queue error: {0}")]
    Queue(String),

    #[error("identity provider error: {0}")]
    Oidc(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code for the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::InvalidTimeRange => "INVALID_TIME_RANGE",
            AppError::InvalidTimezone(_) => "INVALID_TIMEZONE",
            AppError::InvalidRecurrenceRule(_) => "INVALID_RECURRENCE_RULE",
            AppError::Unauthenticated | AppError::SessionNotFound => "UNAUTHORIZED",
            AppError::InsufficientPermission | AppError::NotApprover => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::ResourceNotAvailable => "RESOURCE_CONFLICT",
            AppError::AlreadyApproved => "ALREADY_APPROVED",
            AppError::AlreadyRejected => "ALREADY_REJECTED",
            AppError::InvalidState
            | AppError::InvalidNonce
            | AppError::InvalidAtHash
            | AppError::TokenExpired
            | AppError::InvalidIssuer
            | AppError::InvalidAudience
            | AppError::FutureIssuedAt => "AUTH_FAILED",
            AppError::TooManyRequests => "TOO_MANY_REQUESTS",
            AppError::Database(_) | AppError::Queue(_) | AppError::Oidc(_) | AppError::Internal(_) => {
                "INTERNAL_ERROR"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_share_one_code() {
        for err in [
            AppError::InvalidState,
            AppError::InvalidNonce,
            AppError::InvalidAtHash,
            AppError::TokenExpired,
            AppError::InvalidIssuer,
            AppError::InvalidAudience,
            AppError::FutureIssuedAt,
        ] {
            assert_eq!(err.code(), "AUTH_FAILED");
        }
    }

    #[test]
    fn conflict_code_is_stable() {
        assert_eq!(AppError::ResourceNotAvailable.code(), "RESOURCE_CONFLICT");
    }
}
