//! Double-submit CSRF protection.
//!
//! The callback handler issues a `csrf_token` cookie alongside the session
//! cookie; non-safe methods must echo it in `X-CSRF-Token`. Safe methods
//! pass through untouched.

use axum::{
    extract::Request,
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::session_auth::cookie_value;
use crate::common::AppError;

pub async fn csrf_middleware(request: Request, next: Next) -> Response {
    if matches!(
        *request.method(),
        Method::GET | Method::HEAD | Method::OPTIONS
    ) {
        return next.run(request).await;
    }

    let header_token = request
        .headers()
        .get("x-csrf-token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let cookie_token = cookie_value(&request, "csrf_token");

    match (header_token, cookie_token) {
        (Some(header), Some(cookie)) if !header.is_empty() && header == cookie => {
            next.run(request).await
        }
        _ => AppError::InvalidRequest("missing or mismatched CSRF token".into()).into_response(),
    }
}
