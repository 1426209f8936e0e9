//! The approval engine: the PENDING → CONFIRMED / REJECTED state machine.
//!
//! Both target states are terminal and written at most once: the store's
//! compare-and-set only fires while the row is still PENDING, so a retried
//! or concurrent approval observes the terminal state instead of writing a
//! second transition.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::common::{AppError, AppResult, ReservationId};
use crate::domains::audit::{ActorContext, AuditAction, AuditRecorder};
use crate::domains::notifications::Notifier;
use crate::domains::reservations::{ApprovalStatus, Reservation, ReservationStore, TransitionOutcome};
use crate::domains::users::{Role, User, UserStore};

pub struct ApprovalEngine {
    reservations: Arc<dyn ReservationStore>,
    users: Arc<dyn UserStore>,
    audit: AuditRecorder,
    notifier: Arc<Notifier>,
}

impl ApprovalEngine {
    pub fn new(
        reservations: Arc<dyn ReservationStore>,
        users: Arc<dyn UserStore>,
        audit: AuditRecorder,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            reservations,
            users,
            audit,
            notifier,
        }
    }

    /// `PENDING → CONFIRMED`.
    pub async fn approve(
        &self,
        actor: &ActorContext,
        id: ReservationId,
        start_hint: Option<DateTime<Utc>>,
    ) -> AppResult<Reservation> {
        let (reservation, approver) = self.load_and_authorize(actor, id, start_hint).await?;

        match self
            .reservations
            .set_status_from_pending(id, start_hint, ApprovalStatus::Confirmed)
            .await?
        {
            TransitionOutcome::Applied => {}
            TransitionOutcome::WasConfirmed => return Err(AppError::AlreadyApproved),
            TransitionOutcome::WasRejected => return Err(AppError::AlreadyRejected),
            TransitionOutcome::Missing => return Err(AppError::NotFound("reservation")),
        }

        info!(reservation_id = %id, approver_id = %approver.id, "reservation approved");

        self.audit
            .record(
                actor,
                AuditAction::Approve,
                "reservation",
                &id.to_string(),
                serde_json::json!({
                    "status": ApprovalStatus::Confirmed,
                    "organizer_id": reservation.organizer_id,
                    "title": reservation.title,
                }),
            )
            .await;

        if let Some(organizer) = self.users.find_by_id(reservation.organizer_id).await? {
            self.notifier
                .reservation_approved(&reservation, &organizer.email)
                .await;
        }

        Ok(Reservation {
            approval_status: ApprovalStatus::Confirmed,
            version: reservation.version + 1,
            ..reservation
        })
    }

    /// `PENDING → REJECTED`. The reason may be empty but is recorded.
    pub async fn reject(
        &self,
        actor: &ActorContext,
        id: ReservationId,
        start_hint: Option<DateTime<Utc>>,
        reason: &str,
    ) -> AppResult<Reservation> {
        let (reservation, approver) = self.load_and_authorize(actor, id, start_hint).await?;

        match self
            .reservations
            .set_status_from_pending(id, start_hint, ApprovalStatus::Rejected)
            .await?
        {
            TransitionOutcome::Applied => {}
            TransitionOutcome::WasConfirmed => return Err(AppError::AlreadyApproved),
            TransitionOutcome::WasRejected => return Err(AppError::AlreadyRejected),
            TransitionOutcome::Missing => return Err(AppError::NotFound("reservation")),
        }

        info!(reservation_id = %id, approver_id = %approver.id, "reservation rejected");

        self.audit
            .record(
                actor,
                AuditAction::Reject,
                "reservation",
                &id.to_string(),
                serde_json::json!({
                    "status": ApprovalStatus::Rejected,
                    "organizer_id": reservation.organizer_id,
                    "title": reservation.title,
                    "reason": reason,
                }),
            )
            .await;

        if let Some(organizer) = self.users.find_by_id(reservation.organizer_id).await? {
            self.notifier
                .reservation_rejected(&reservation, reason, &organizer.email)
                .await;
        }

        Ok(Reservation {
            approval_status: ApprovalStatus::Rejected,
            version: reservation.version + 1,
            ..reservation
        })
    }

    /// ADMIN approves anything; MANAGER approves unless they are the
    /// organiser; every other role is not an approver.
    async fn load_and_authorize(
        &self,
        actor: &ActorContext,
        id: ReservationId,
        start_hint: Option<DateTime<Utc>>,
    ) -> AppResult<(Reservation, User)> {
        let approver = self
            .users
            .find_by_id(actor.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AppError::Unauthenticated)?;

        let reservation = self
            .reservations
            .find_reservation(id, start_hint)
            .await?
            .ok_or(AppError::NotFound("reservation"))?;

        match approver.role {
            Role::Admin => {}
            Role::Manager if reservation.organizer_id != approver.id => {}
            Role::Manager => return Err(AppError::NotApprover),
            _ => return Err(AppError::NotApprover),
        }

        Ok((reservation, approver))
    }
}
