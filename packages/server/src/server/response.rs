//! The JSON response envelope and error mapping.
//!
//! Every API payload travels as `{success, data?, error?}`; the error
//! branch carries a stable machine code plus a human message. Storage and
//! IdP failures surface as opaque 500s; everything else maps per the error
//! taxonomy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::common::AppError;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

impl ApiResponse<()> {
    pub fn empty() -> Json<Self> {
        Json(Self {
            success: true,
            data: None,
            error: None,
        })
    }

    pub fn failure(code: &str, message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.to_string(),
                message: message.to_string(),
            }),
        }
    }
}

fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::InvalidRequest(_)
        | AppError::InvalidTimeRange
        | AppError::InvalidTimezone(_)
        | AppError::InvalidRecurrenceRule(_)
        | AppError::AlreadyApproved
        | AppError::AlreadyRejected => StatusCode::BAD_REQUEST,

        AppError::Unauthenticated
        | AppError::SessionNotFound
        | AppError::InvalidState
        | AppError::InvalidNonce
        | AppError::InvalidAtHash
        | AppError::TokenExpired
        | AppError::InvalidIssuer
        | AppError::InvalidAudience
        | AppError::FutureIssuedAt => StatusCode::UNAUTHORIZED,

        AppError::InsufficientPermission | AppError::NotApprover => StatusCode::FORBIDDEN,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::ResourceNotAvailable => StatusCode::CONFLICT,
        AppError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,

        AppError::Database(_) | AppError::Queue(_) | AppError::Oidc(_) | AppError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self);

        // Internal failures are logged with detail and surfaced opaquely.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ApiResponse::failure(self.code(), &message);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_maps_to_409() {
        assert_eq!(status_for(&AppError::ResourceNotAvailable), StatusCode::CONFLICT);
    }

    #[test]
    fn terminal_approval_errors_are_400_with_explicit_codes() {
        assert_eq!(status_for(&AppError::AlreadyApproved), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::AlreadyApproved.code(), "ALREADY_APPROVED");
        assert_eq!(status_for(&AppError::AlreadyRejected), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::AlreadyRejected.code(), "ALREADY_REJECTED");
    }

    #[test]
    fn auth_failures_are_401() {
        assert_eq!(status_for(&AppError::InvalidNonce), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(&AppError::SessionNotFound), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn envelope_shape() {
        let body = serde_json::to_value(&ApiResponse::failure("NOT_FOUND", "resource not found")).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert!(body.get("data").is_none());
    }
}
