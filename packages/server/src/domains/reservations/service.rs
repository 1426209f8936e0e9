//! The reservation engine: validation, recurrence expansion, conflict-free
//! allocation, and cancellation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use typed_builder::TypedBuilder;

use super::models::{InstanceStatus, Reservation, ReservationInstance};
use super::policy::{BookingPolicy, CancellationPolicy};
use super::recurrence;
use super::store::{NewBooking, ReservationStore};
use crate::common::{
    AppError, AppResult, Clock, IdGen, InstanceId, ReservationId, ResourceId, UserId,
};
use crate::domains::audit::{ActorContext, AuditAction, AuditRecorder};
use crate::domains::notifications::Notifier;
use crate::domains::resources::{Resource, ResourceStore, ResourceType};
use crate::domains::users::UserStore;

/// How far ahead an unbounded RRULE is materialised at creation time.
const EXPANSION_HORIZON_DAYS: i64 = 365;

/// A create-reservation request, already authenticated: `organizer_id` is
/// the calling user.
#[derive(Debug, Clone, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct CreateReservationRequest {
    pub organizer_id: UserId,
    pub resource_ids: Vec<ResourceId>,
    pub title: String,
    #[builder(default)]
    pub description: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    #[builder(default)]
    pub rrule: Option<String>,
    #[builder(default = false)]
    pub is_private: bool,
    pub timezone: String,
}

pub struct ReservationEngine {
    reservations: Arc<dyn ReservationStore>,
    resources: Arc<dyn ResourceStore>,
    users: Arc<dyn UserStore>,
    audit: AuditRecorder,
    notifier: Arc<Notifier>,
    clock: Arc<dyn Clock>,
    id_gen: Arc<dyn IdGen>,
    booking_policy: Arc<dyn BookingPolicy>,
    cancellation_policy: Arc<dyn CancellationPolicy>,
}

impl ReservationEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reservations: Arc<dyn ReservationStore>,
        resources: Arc<dyn ResourceStore>,
        users: Arc<dyn UserStore>,
        audit: AuditRecorder,
        notifier: Arc<Notifier>,
        clock: Arc<dyn Clock>,
        id_gen: Arc<dyn IdGen>,
        booking_policy: Arc<dyn BookingPolicy>,
        cancellation_policy: Arc<dyn CancellationPolicy>,
    ) -> Self {
        Self {
            reservations,
            resources,
            users,
            audit,
            notifier,
            clock,
            id_gen,
            booking_policy,
            cancellation_policy,
        }
    }

    /// Create a reservation: validate, expand, allocate atomically, then
    /// fire the audit entry and notification.
    pub async fn create_reservation(
        &self,
        actor: &ActorContext,
        mut req: CreateReservationRequest,
    ) -> AppResult<Reservation> {
        if req.resource_ids.is_empty() {
            return Err(AppError::InvalidRequest(
                "at least one resource is required".into(),
            ));
        }
        if req.title.trim().is_empty() {
            return Err(AppError::InvalidRequest("title is required".into()));
        }
        req.resource_ids.sort();
        req.resource_ids.dedup();

        let organizer = self
            .users
            .find_by_id(req.organizer_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AppError::Unauthenticated)?;

        let resources = self.resources.find_by_ids(&req.resource_ids).await?;
        if resources.len() != req.resource_ids.len() {
            return Err(AppError::NotFound("resource"));
        }
        for resource in &resources {
            if !resource.is_active {
                return Err(AppError::InvalidRequest(format!(
                    "resource {} is not active",
                    resource.name
                )));
            }
            if !resource.bookable_by(organizer.role) {
                return Err(AppError::InsufficientPermission);
            }
        }

        let now = self.clock.now();
        let reservation = Reservation {
            id: ReservationId::from_uuid(self.id_gen.new_uuid()),
            organizer_id: organizer.id,
            title: req.title.clone(),
            description: req.description.clone(),
            start_at: req.start_at,
            end_at: req.end_at,
            rrule: req.rrule.clone(),
            is_private: req.is_private,
            timezone: req.timezone.clone(),
            approval_status: self.booking_policy.initial_status(&organizer, &resources),
            version: 1,
            created_at: now,
            updated_at: now,
        };
        reservation.validate()?;

        let instances = self.expand_instances(&reservation)?;
        let booking = NewBooking {
            reservation: reservation.clone(),
            instances,
            resource_ids: req.resource_ids.clone(),
        };
        self.reservations.create_booking(&booking).await?;

        info!(
            reservation_id = %reservation.id,
            organizer_id = %organizer.id,
            instances = booking.instances.len(),
            resources = booking.resource_ids.len(),
            "reservation created"
        );

        // Side effects follow the commit and never roll it back.
        self.audit
            .record(
                actor,
                AuditAction::Create,
                "reservation",
                &reservation.id.to_string(),
                serde_json::json!({
                    "title": reservation.title,
                    "start_at": reservation.start_at,
                    "end_at": reservation.end_at,
                    "recurring": reservation.rrule.is_some(),
                    "resource_ids": req.resource_ids,
                }),
            )
            .await;
        self.notifier
            .reservation_created(&reservation, &organizer.email)
            .await;

        Ok(reservation)
    }

    /// Cancel one occurrence. Only the organiser may cancel; cancelling the
    /// last occurrence removes the parent as well.
    pub async fn cancel_reservation(
        &self,
        actor: &ActorContext,
        id: ReservationId,
        instance_start_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let reservation = self
            .reservations
            .find_reservation(id, None)
            .await?
            .ok_or(AppError::NotFound("reservation"))?;

        if reservation.organizer_id != actor.user_id {
            return Err(AppError::InsufficientPermission);
        }

        let outcome = self.reservations.cancel_instance(id, instance_start_at).await?;
        let now = self.clock.now();

        if let Some(penalty) = self
            .cancellation_policy
            .penalty_for(now, outcome.instance.start_at)
        {
            if let Err(e) = self
                .users
                .add_penalty(reservation.organizer_id, penalty.points, penalty.expires_at)
                .await
            {
                warn!(user_id = %reservation.organizer_id, error = %e, "failed to apply late-cancel penalty");
            }
        }

        info!(
            reservation_id = %id,
            instance_start_at = %instance_start_at,
            parent_removed = outcome.parent_removed,
            "reservation instance cancelled"
        );

        self.audit
            .record(
                actor,
                AuditAction::Cancel,
                "reservation",
                &id.to_string(),
                serde_json::json!({
                    "title": reservation.title,
                    "instance_start_at": instance_start_at,
                    "parent_removed": outcome.parent_removed,
                }),
            )
            .await;

        if let Some(organizer) = self.users.find_by_id(reservation.organizer_id).await? {
            self.notifier
                .reservation_cancelled(&reservation, outcome.instance.start_at, &organizer.email)
                .await;
        }

        Ok(())
    }

    /// Resources of `resource_type` free over `[start, end)`.
    pub async fn find_alternatives(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        resource_type: ResourceType,
    ) -> AppResult<Vec<Resource>> {
        if start >= end {
            return Err(AppError::InvalidTimeRange);
        }
        self.resources.find_available(start, end, resource_type).await
    }

    pub async fn find_reservation(
        &self,
        id: ReservationId,
        start_hint: Option<DateTime<Utc>>,
    ) -> AppResult<Option<Reservation>> {
        self.reservations.find_reservation(id, start_hint).await
    }

    pub async fn find_instances(&self, id: ReservationId) -> AppResult<Vec<ReservationInstance>> {
        self.reservations.find_instances(id).await
    }

    pub async fn list_for_organizer(
        &self,
        organizer_id: UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Reservation>> {
        self.reservations.list_for_organizer(organizer_id, from, to).await
    }

    /// One instance for a single-shot request; RFC 5545 expansion over the
    /// creation horizon for a recurring one. Every sibling carries the
    /// parent's canonical start as its partition key.
    fn expand_instances(&self, reservation: &Reservation) -> AppResult<Vec<ReservationInstance>> {
        let now = reservation.created_at;
        let duration = reservation.duration();

        let starts = match &reservation.rrule {
            None => vec![reservation.start_at],
            Some(rrule) => {
                let window_end = reservation.start_at + Duration::days(EXPANSION_HORIZON_DAYS);
                let starts = recurrence::expand_occurrences(
                    rrule,
                    reservation.start_at,
                    reservation.start_at,
                    window_end,
                )?;
                if starts.is_empty() {
                    return Err(AppError::InvalidRecurrenceRule(
                        "rule yields no occurrences".into(),
                    ));
                }
                starts
            }
        };

        Ok(starts
            .into_iter()
            .map(|start_at| ReservationInstance {
                id: InstanceId::from_uuid(self.id_gen.new_uuid()),
                reservation_id: reservation.id,
                reservation_start_at: reservation.start_at,
                start_at,
                end_at: start_at + duration,
                original_start_at: None,
                status: InstanceStatus::Confirmed,
                checked_in_at: None,
                created_at: now,
            })
            .collect())
    }
}
