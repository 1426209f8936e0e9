//! Reservation persistence: transactional allocation, cancellation, and
//! the approval status transition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use super::models::{ApprovalStatus, Reservation, ReservationInstance};
use crate::common::{AppError, AppResult, ReservationId, ResourceId};

/// A fully expanded booking ready to be written atomically.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub reservation: Reservation,
    pub instances: Vec<ReservationInstance>,
    pub resource_ids: Vec<ResourceId>,
}

/// Result of cancelling one instance.
#[derive(Debug, Clone)]
pub struct CancelOutcome {
    pub instance: ReservationInstance,
    /// True when the cancelled instance was the last one and the parent was
    /// removed with it.
    pub parent_removed: bool,
}

/// Result of the compare-and-set status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    WasConfirmed,
    WasRejected,
    Missing,
}

#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Write parent + instances + assignments in one transaction, first
    /// verifying (under row locks) that no requested resource has a
    /// non-cancelled instance overlapping any new instance. Fails with
    /// [`AppError::ResourceNotAvailable`] and writes nothing on conflict.
    async fn create_booking(&self, booking: &NewBooking) -> AppResult<()>;

    /// Look up a parent. `start_hint` is the canonical start used to locate
    /// the partition; `None` scans all partitions.
    async fn find_reservation(
        &self,
        id: ReservationId,
        start_hint: Option<DateTime<Utc>>,
    ) -> AppResult<Option<Reservation>>;

    async fn find_instances(&self, id: ReservationId) -> AppResult<Vec<ReservationInstance>>;

    /// Resource IDs assigned to any instance of the reservation.
    async fn find_assigned_resources(&self, id: ReservationId) -> AppResult<Vec<ResourceId>>;

    /// Remove the instance of `id` starting at `instance_start_at`,
    /// cascading its assignments; removes the parent when it was the last
    /// instance.
    async fn cancel_instance(
        &self,
        id: ReservationId,
        instance_start_at: DateTime<Utc>,
    ) -> AppResult<CancelOutcome>;

    /// Transition PENDING → `new_status` at most once. Never overwrites a
    /// terminal state; reports what was found instead.
    async fn set_status_from_pending(
        &self,
        id: ReservationId,
        start_hint: Option<DateTime<Utc>>,
        new_status: ApprovalStatus,
    ) -> AppResult<TransitionOutcome>;

    /// Parents organised by `organizer_id` whose canonical start falls in
    /// `[from, to)`.
    async fn list_for_organizer(
        &self,
        organizer_id: crate::common::UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Reservation>>;
}

/// Postgres implementation.
pub struct PgReservationStore {
    pool: PgPool,
}

impl PgReservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Row-locking overlap probe for one candidate interval. Locking the
    /// candidate rows serialises concurrent creators on the same resource
    /// and prevents write-skew between the check and the insert.
    async fn has_conflict(
        tx: &mut Transaction<'_, Postgres>,
        resource_ids: &[ResourceId],
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let hit: Option<(uuid::Uuid,)> = sqlx::query_as(
            r#"
            SELECT i.id
            FROM reservation_instances i
            JOIN instance_assignments a ON a.instance_id = i.id
            WHERE a.resource_id = ANY($1)
              AND i.status <> 'CANCELLED'
              AND i.start_at < $3
              AND i.end_at > $2
            FOR UPDATE OF i
            LIMIT 1
            "#,
        )
        .bind(resource_ids)
        .bind(start_at)
        .bind(end_at)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(hit.is_some())
    }
}

#[async_trait]
impl ReservationStore for PgReservationStore {
    async fn create_booking(&self, booking: &NewBooking) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        for instance in &booking.instances {
            if Self::has_conflict(&mut tx, &booking.resource_ids, instance.start_at, instance.end_at)
                .await?
            {
                // Dropping the transaction rolls everything back.
                return Err(AppError::ResourceNotAvailable);
            }
        }

        let r = &booking.reservation;
        sqlx::query(
            r#"
            INSERT INTO reservations (
                id, organizer_id, title, description, start_at, end_at,
                rrule, is_private, timezone, approval_status, version,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(r.id)
        .bind(r.organizer_id)
        .bind(&r.title)
        .bind(&r.description)
        .bind(r.start_at)
        .bind(r.end_at)
        .bind(&r.rrule)
        .bind(r.is_private)
        .bind(&r.timezone)
        .bind(r.approval_status)
        .bind(r.version)
        .bind(r.created_at)
        .bind(r.updated_at)
        .execute(&mut *tx)
        .await?;

        for instance in &booking.instances {
            sqlx::query(
                r#"
                INSERT INTO reservation_instances (
                    id, reservation_id, reservation_start_at, start_at,
                    end_at, original_start_at, status, checked_in_at,
                    created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(instance.id)
            .bind(instance.reservation_id)
            .bind(instance.reservation_start_at)
            .bind(instance.start_at)
            .bind(instance.end_at)
            .bind(instance.original_start_at)
            .bind(instance.status)
            .bind(instance.checked_in_at)
            .bind(instance.created_at)
            .execute(&mut *tx)
            .await?;

            for resource_id in &booking.resource_ids {
                sqlx::query(
                    "INSERT INTO instance_assignments (instance_id, resource_id) VALUES ($1, $2)",
                )
                .bind(instance.id)
                .bind(resource_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_reservation(
        &self,
        id: ReservationId,
        start_hint: Option<DateTime<Utc>>,
    ) -> AppResult<Option<Reservation>> {
        sqlx::query_as::<_, Reservation>(
            r#"
            SELECT * FROM reservations
            WHERE id = $1 AND ($2::timestamptz IS NULL OR start_at = $2)
            "#,
        )
        .bind(id)
        .bind(start_hint)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn find_instances(&self, id: ReservationId) -> AppResult<Vec<ReservationInstance>> {
        sqlx::query_as::<_, ReservationInstance>(
            r#"
            SELECT * FROM reservation_instances
            WHERE reservation_id = $1
            ORDER BY start_at ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn find_assigned_resources(&self, id: ReservationId) -> AppResult<Vec<ResourceId>> {
        let rows: Vec<(ResourceId,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT a.resource_id
            FROM instance_assignments a
            JOIN reservation_instances i ON i.id = a.instance_id
            WHERE i.reservation_id = $1
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn cancel_instance(
        &self,
        id: ReservationId,
        instance_start_at: DateTime<Utc>,
    ) -> AppResult<CancelOutcome> {
        let mut tx = self.pool.begin().await?;

        let instance = sqlx::query_as::<_, ReservationInstance>(
            r#"
            SELECT * FROM reservation_instances
            WHERE reservation_id = $1 AND start_at = $2
            FOR UPDATE
            "#,
        )
        .bind(id)
        .bind(instance_start_at)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("reservation instance"))?;

        sqlx::query("DELETE FROM instance_assignments WHERE instance_id = $1")
            .bind(instance.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM reservation_instances WHERE id = $1")
            .bind(instance.id)
            .execute(&mut *tx)
            .await?;

        let (remaining,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM reservation_instances WHERE reservation_id = $1",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        let parent_removed = remaining == 0;
        if parent_removed {
            sqlx::query("DELETE FROM reservations WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(CancelOutcome {
            instance,
            parent_removed,
        })
    }

    async fn set_status_from_pending(
        &self,
        id: ReservationId,
        start_hint: Option<DateTime<Utc>>,
        new_status: ApprovalStatus,
    ) -> AppResult<TransitionOutcome> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE reservations
            SET approval_status = $3, version = version + 1, updated_at = NOW()
            WHERE id = $1
              AND ($2::timestamptz IS NULL OR start_at = $2)
              AND approval_status = 'PENDING'
            "#,
        )
        .bind(id)
        .bind(start_hint)
        .bind(new_status)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() > 0 {
            tx.commit().await?;
            return Ok(TransitionOutcome::Applied);
        }

        // Nothing transitioned: report what is there instead.
        let current: Option<(ApprovalStatus,)> = sqlx::query_as(
            r#"
            SELECT approval_status FROM reservations
            WHERE id = $1 AND ($2::timestamptz IS NULL OR start_at = $2)
            "#,
        )
        .bind(id)
        .bind(start_hint)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(match current {
            Some((ApprovalStatus::Confirmed,)) => TransitionOutcome::WasConfirmed,
            Some((ApprovalStatus::Rejected,)) => TransitionOutcome::WasRejected,
            Some((ApprovalStatus::Pending,)) => TransitionOutcome::Missing,
            None => TransitionOutcome::Missing,
        })
    }

    async fn list_for_organizer(
        &self,
        organizer_id: crate::common::UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Reservation>> {
        sqlx::query_as::<_, Reservation>(
            r#"
            SELECT * FROM reservations
            WHERE organizer_id = $1 AND start_at >= $2 AND start_at < $3
            ORDER BY start_at ASC
            "#,
        )
        .bind(organizer_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }
}
