//! Compliance endpoint over the audit log. AUDITOR and ADMIN only.

use axum::extract::{Extension, Query, State};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::common::pagination::PageParams;
use crate::common::{AppError, AppResult, UserId};
use crate::domains::audit::{AuditAction, AuditFilter};
use crate::domains::users::Role;
use crate::server::app::AppState;
use crate::server::middleware::CurrentUser;
use crate::server::response::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub user_id: Option<UserId>,
    pub action: Option<AuditAction>,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_audit_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<AuditQuery>,
) -> AppResult<impl IntoResponse> {
    if !matches!(user.role, Role::Admin | Role::Auditor) {
        return Err(AppError::InsufficientPermission);
    }

    let filter = AuditFilter {
        user_id: query.user_id,
        action: query.action,
        target_type: query.target_type,
        target_id: query.target_id,
        from: query.from,
        to: query.to,
    };
    let page = PageParams {
        offset: query.offset,
        limit: query.limit,
    }
    .validate();
    let entries = state.audit.list(&filter, page).await?;
    Ok(ApiResponse::ok(entries))
}
