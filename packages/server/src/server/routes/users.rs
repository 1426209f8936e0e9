//! User handlers: the caller's profile, and admin-only listing/lookup.

use axum::extract::{Extension, Path, Query, State};
use axum::response::IntoResponse;

use crate::common::pagination::PageParams;
use crate::common::{AppError, AppResult, UserId};
use crate::domains::users::Role;
use crate::server::app::AppState;
use crate::server::middleware::CurrentUser;
use crate::server::response::ApiResponse;

pub async fn me_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<impl IntoResponse> {
    let profile = state
        .users
        .find_by_id(user.user_id)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    Ok(ApiResponse::ok(profile))
}

pub async fn list_users_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(page): Query<PageParams>,
) -> AppResult<impl IntoResponse> {
    if user.role != Role::Admin {
        return Err(AppError::InsufficientPermission);
    }
    let users = state.users.list(page.validate()).await?;
    Ok(ApiResponse::ok(users))
}

pub async fn get_user_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<UserId>,
) -> AppResult<impl IntoResponse> {
    if user.role != Role::Admin {
        return Err(AppError::InsufficientPermission);
    }
    let found = state
        .users
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    Ok(ApiResponse::ok(found))
}
