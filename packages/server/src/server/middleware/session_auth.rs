//! Session resolution for protected routes.
//!
//! Accepts `Authorization: Bearer <sessionId>` or the `session_id` cookie,
//! resolves the session, and stores a [`CurrentUser`] in the request
//! extensions. Requests without a live session are rejected with 401
//! before the handler runs.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::common::{AppError, UserId};
use crate::domains::auth::AuthService;
use crate::domains::users::Role;

/// The authenticated caller, copied out of the session.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub session_id: String,
}

pub async fn session_auth_middleware(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(session_id) = session_id_from_request(&request) else {
        return AppError::Unauthenticated.into_response();
    };

    match auth.get_session(&session_id).await {
        Ok(session) => {
            request.extensions_mut().insert(CurrentUser {
                user_id: session.user_id,
                email: session.email,
                display_name: session.display_name,
                role: session.role,
                session_id,
            });
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

fn session_id_from_request(request: &Request) -> Option<String> {
    // Bearer token wins over the cookie.
    if let Some(value) = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(token) = value.strip_prefix("Bearer ") {
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    cookie_value(request, "session_id")
}

/// Minimal cookie-header scan; the service only reads two cookies.
pub fn cookie_value(request: &Request, name: &str) -> Option<String> {
    let header = request
        .headers()
        .get(axum::http::header::COOKIE)?
        .to_str()
        .ok()?;
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}
