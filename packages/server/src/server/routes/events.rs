//! Reservation ("event") handlers.

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::actor_context;
use crate::common::{AppError, AppResult, ReservationId, ResourceId};
use crate::domains::reservations::{
    CreateReservationRequest, Reservation, ReservationInstance,
};
use crate::server::app::AppState;
use crate::server::middleware::{ClientMeta, CurrentUser};
use crate::server::response::ApiResponse;

/// Default listing window when the caller gives no bounds.
const DEFAULT_LIST_WINDOW_DAYS: i64 = 90;

#[derive(Debug, Deserialize)]
pub struct CreateEventBody {
    pub resource_ids: Vec<ResourceId>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    #[serde(default)]
    pub rrule: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    pub timezone: String,
}

pub async fn create_event_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Extension(meta): Extension<ClientMeta>,
    axum::Json(body): axum::Json<CreateEventBody>,
) -> AppResult<impl IntoResponse> {
    let request = CreateReservationRequest::builder()
        .organizer_id(user.user_id)
        .resource_ids(body.resource_ids)
        .title(body.title)
        .description(body.description)
        .start_at(body.start_at)
        .end_at(body.end_at)
        .rrule(body.rrule)
        .is_private(body.is_private)
        .timezone(body.timezone)
        .build();

    let actor = actor_context(&user, Some(&meta));
    let reservation = state.reservations.create_reservation(&actor, request).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(reservation)))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub async fn list_events_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ListQuery>,
) -> AppResult<impl IntoResponse> {
    let from = query
        .from
        .unwrap_or_else(|| state.clock.now() - Duration::days(1));
    let to = query
        .to
        .unwrap_or_else(|| from + Duration::days(DEFAULT_LIST_WINDOW_DAYS));
    if from >= to {
        return Err(AppError::InvalidTimeRange);
    }
    let reservations = state
        .reservations
        .list_for_organizer(user.user_id, from, to)
        .await?;
    Ok(ApiResponse::ok(reservations))
}

#[derive(Debug, Deserialize)]
pub struct StartAtQuery {
    /// Canonical parent start, used to locate the year partition.
    pub start_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct EventDetail {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub instances: Vec<ReservationInstance>,
}

pub async fn get_event_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<ReservationId>,
    Query(query): Query<StartAtQuery>,
) -> AppResult<impl IntoResponse> {
    let reservation = state
        .reservations
        .find_reservation(id, query.start_at)
        .await?
        .ok_or(AppError::NotFound("reservation"))?;

    // Private reservations are visible to their organiser and admins only.
    if reservation.is_private
        && reservation.organizer_id != user.user_id
        && user.role != crate::domains::users::Role::Admin
    {
        return Err(AppError::NotFound("reservation"));
    }

    let instances = state.reservations.find_instances(id).await?;
    Ok(ApiResponse::ok(EventDetail {
        reservation,
        instances,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CancelQuery {
    /// Start of the occurrence being cancelled.
    pub start_at: DateTime<Utc>,
}

pub async fn cancel_event_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Extension(meta): Extension<ClientMeta>,
    Path(id): Path<ReservationId>,
    Query(query): Query<CancelQuery>,
) -> AppResult<impl IntoResponse> {
    let actor = actor_context(&user, Some(&meta));
    state
        .reservations
        .cancel_reservation(&actor, id, query.start_at)
        .await?;
    Ok(ApiResponse::empty())
}

pub async fn approve_event_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Extension(meta): Extension<ClientMeta>,
    Path(id): Path<ReservationId>,
    Query(query): Query<StartAtQuery>,
) -> AppResult<impl IntoResponse> {
    let actor = actor_context(&user, Some(&meta));
    let reservation = state.approvals.approve(&actor, id, query.start_at).await?;
    Ok(ApiResponse::ok(reservation))
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
    #[serde(default)]
    pub reason: String,
}

pub async fn reject_event_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Extension(meta): Extension<ClientMeta>,
    Path(id): Path<ReservationId>,
    Query(query): Query<StartAtQuery>,
    axum::Json(body): axum::Json<RejectBody>,
) -> AppResult<impl IntoResponse> {
    let actor = actor_context(&user, Some(&meta));
    let reservation = state
        .approvals
        .reject(&actor, id, query.start_at, &body.reason)
        .await?;
    Ok(ApiResponse::ok(reservation))
}
