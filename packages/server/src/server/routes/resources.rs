//! Resource CRUD and availability handlers.
//!
//! Mutation requires ADMIN or SECRETARY; reads are open to any
//! authenticated user.

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::common::{AppError, AppResult, ResourceId};
use crate::domains::resources::{CreateResource, ResourceType, UpdateResource};
use crate::domains::users::Role;
use crate::server::app::AppState;
use crate::server::middleware::CurrentUser;
use crate::server::response::ApiResponse;

fn require_resource_admin(user: &CurrentUser) -> AppResult<()> {
    match user.role {
        Role::Admin | Role::Secretary => Ok(()),
        _ => Err(AppError::InsufficientPermission),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListResourcesQuery {
    #[serde(rename = "type")]
    pub resource_type: Option<ResourceType>,
}

pub async fn list_resources_handler(
    State(state): State<AppState>,
    Query(query): Query<ListResourcesQuery>,
) -> AppResult<impl IntoResponse> {
    let resources = state.resources.list(query.resource_type).await?;
    Ok(ApiResponse::ok(resources))
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
}

/// Alternatives search: resources of a type free over the window.
pub async fn available_resources_handler(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<impl IntoResponse> {
    let resources = state
        .reservations
        .find_alternatives(query.start_at, query.end_at, query.resource_type)
        .await?;
    Ok(ApiResponse::ok(resources))
}

pub async fn get_resource_handler(
    State(state): State<AppState>,
    Path(id): Path<ResourceId>,
) -> AppResult<impl IntoResponse> {
    let resource = state
        .resources
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound("resource"))?;
    Ok(ApiResponse::ok(resource))
}

#[derive(Debug, Deserialize)]
pub struct CreateResourceBody {
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    #[serde(default)]
    pub capacity: Option<i32>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub attributes: Option<serde_json::Value>,
    #[serde(default)]
    pub required_role: Option<Role>,
}

pub async fn create_resource_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    axum::Json(body): axum::Json<CreateResourceBody>,
) -> AppResult<impl IntoResponse> {
    require_resource_admin(&user)?;

    if body.name.trim().is_empty() {
        return Err(AppError::InvalidRequest("name is required".into()));
    }
    if body.resource_type == ResourceType::MeetingRoom && body.capacity.unwrap_or(0) <= 0 {
        return Err(AppError::InvalidRequest(
            "meeting rooms require a positive capacity".into(),
        ));
    }

    let resource = state
        .resources
        .create(
            CreateResource::builder()
                .id(ResourceId::from_uuid(state.id_gen.new_uuid()))
                .name(body.name)
                .resource_type(body.resource_type)
                .capacity(body.capacity)
                .location(body.location)
                .attributes(body.attributes.unwrap_or_else(|| serde_json::json!({})))
                .required_role(body.required_role)
                .now(state.clock.now())
                .build(),
        )
        .await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(resource)))
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateResourceBody {
    pub name: Option<String>,
    pub capacity: Option<i32>,
    pub location: Option<String>,
    pub attributes: Option<serde_json::Value>,
    pub required_role: Option<Role>,
    pub is_active: Option<bool>,
}

pub async fn update_resource_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<ResourceId>,
    axum::Json(body): axum::Json<UpdateResourceBody>,
) -> AppResult<impl IntoResponse> {
    require_resource_admin(&user)?;

    let resource = state
        .resources
        .update(
            id,
            UpdateResource {
                name: body.name,
                capacity: body.capacity,
                location: body.location,
                attributes: body.attributes,
                required_role: body.required_role,
                is_active: body.is_active,
            },
        )
        .await?;
    Ok(ApiResponse::ok(resource))
}

pub async fn delete_resource_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<ResourceId>,
) -> AppResult<impl IntoResponse> {
    require_resource_admin(&user)?;
    state.resources.delete(id).await?;
    Ok(ApiResponse::empty())
}
