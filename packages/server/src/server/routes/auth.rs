//! Login, callback, refresh, and logout handlers.

use axum::extract::{Extension, Query, State};
use axum::http::header::SET_COOKIE;
use axum::response::{AppendHeaders, IntoResponse};
use serde::{Deserialize, Serialize};

use crate::common::AppResult;
use crate::domains::auth::{ClientInfo, Session};
use crate::server::app::AppState;
use crate::server::middleware::{ClientMeta, CurrentUser};
use crate::server::response::ApiResponse;

/// Session cookie lifetime in seconds, matching the default session TTL.
const COOKIE_MAX_AGE_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub state: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub authorization_url: String,
}

pub async fn login_handler(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> AppResult<impl IntoResponse> {
    let authorization_url = state.auth.begin_login(query.state).await?;
    Ok(ApiResponse::ok(LoginResponse { authorization_url }))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub state: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: SessionUser,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: crate::common::UserId,
    pub email: String,
    pub display_name: String,
    pub role: crate::domains::users::Role,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            user: SessionUser {
                id: session.user_id,
                email: session.email.clone(),
                display_name: session.display_name.clone(),
                role: session.role,
            },
            expires_at: session.expires_at,
        }
    }
}

pub async fn callback_handler(
    State(state): State<AppState>,
    Extension(meta): Extension<ClientMeta>,
    Query(query): Query<CallbackQuery>,
) -> AppResult<impl IntoResponse> {
    let client = ClientInfo {
        ip_address: meta.ip.map(|ip| ip.to_string()),
        user_agent: meta.user_agent.clone(),
    };
    let (session, session_id) = state.auth.handle_callback(&query.code, &query.state, &client).await?;

    // The minted session id goes into the cookie; the CSRF token is
    // readable by the front-end for the double-submit header.
    let csrf_token = state.id_gen.new_token();
    let headers = AppendHeaders([
        (SET_COOKIE, session_cookie(&session_id, COOKIE_MAX_AGE_SECS)),
        (SET_COOKIE, csrf_cookie(&csrf_token, COOKIE_MAX_AGE_SECS)),
    ]);

    Ok((headers, ApiResponse::ok(SessionResponse::from(&session))))
}

pub async fn refresh_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<impl IntoResponse> {
    let session = state.auth.refresh_session(&user.session_id).await?;
    Ok(ApiResponse::ok(SessionResponse::from(&session)))
}

pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Extension(meta): Extension<ClientMeta>,
) -> AppResult<impl IntoResponse> {
    let client = ClientInfo {
        ip_address: meta.ip.map(|ip| ip.to_string()),
        user_agent: meta.user_agent.clone(),
    };
    state.auth.logout(&user.session_id, &client).await?;

    let headers = AppendHeaders([
        (SET_COOKIE, session_cookie("", 0)),
        (SET_COOKIE, csrf_cookie("", 0)),
    ]);
    Ok((headers, ApiResponse::empty()))
}

fn session_cookie(session_id: &str, max_age: i64) -> String {
    format!(
        "session_id={session_id}; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age={max_age}"
    )
}

fn csrf_cookie(token: &str, max_age: i64) -> String {
    format!("csrf_token={token}; Path=/; Secure; SameSite=Lax; Max-Age={max_age}")
}
