//! Notification fan-out with duplicate suppression.
//!
//! The notifier renders a template, checks the per-process dedupe cache,
//! and enqueues a `send_email` job. Enqueue failures are logged and
//! swallowed; a lost notification never fails the primary write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use super::handlers::{SendEmailPayload, SEND_EMAIL_JOB};
use super::templates::{self, Rendered};
use crate::common::{Clock, IdGen, ReservationId};
use crate::domains::reservations::Reservation;
use crate::kernel::jobs::{Job, JobQueue};

/// Suppress a repeat send of the same kind for the same reservation inside
/// this window.
const DEDUPE_WINDOW_SECS: i64 = 60 * 60;
/// Purge entries older than this once the cache exceeds the size cap.
const DEDUPE_MAX_AGE_SECS: i64 = 24 * 60 * 60;
const DEDUPE_MAX_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    ReservationCreated,
    ReservationCancelled,
    ReservationApproved,
    ReservationRejected,
    ReservationReminder,
}

impl NotificationKind {
    pub fn key(self) -> &'static str {
        match self {
            NotificationKind::ReservationCreated => "reservation_created",
            NotificationKind::ReservationCancelled => "reservation_cancelled",
            NotificationKind::ReservationApproved => "reservation_approved",
            NotificationKind::ReservationRejected => "reservation_rejected",
            NotificationKind::ReservationReminder => "reservation_reminder",
        }
    }
}

pub struct Notifier {
    queue: Arc<dyn JobQueue>,
    clock: Arc<dyn Clock>,
    id_gen: Arc<dyn IdGen>,
    dedupe: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl Notifier {
    pub fn new(queue: Arc<dyn JobQueue>, clock: Arc<dyn Clock>, id_gen: Arc<dyn IdGen>) -> Self {
        Self {
            queue,
            clock,
            id_gen,
            dedupe: Mutex::new(HashMap::new()),
        }
    }

    pub async fn reservation_created(&self, reservation: &Reservation, recipient: &str) {
        let rendered =
            templates::reservation_created(&reservation.title, reservation.start_at, reservation.end_at);
        self.send(NotificationKind::ReservationCreated, reservation.id, recipient, rendered)
            .await;
    }

    pub async fn reservation_cancelled(
        &self,
        reservation: &Reservation,
        instance_start_at: DateTime<Utc>,
        recipient: &str,
    ) {
        let rendered = templates::reservation_cancelled(&reservation.title, instance_start_at);
        self.send(NotificationKind::ReservationCancelled, reservation.id, recipient, rendered)
            .await;
    }

    pub async fn reservation_approved(&self, reservation: &Reservation, recipient: &str) {
        let rendered = templates::reservation_approved(&reservation.title);
        self.send(NotificationKind::ReservationApproved, reservation.id, recipient, rendered)
            .await;
    }

    pub async fn reservation_rejected(&self, reservation: &Reservation, reason: &str, recipient: &str) {
        let rendered = templates::reservation_rejected(&reservation.title, reason);
        self.send(NotificationKind::ReservationRejected, reservation.id, recipient, rendered)
            .await;
    }

    pub async fn reservation_reminder(&self, reservation: &Reservation, recipient: &str) {
        let rendered = templates::reservation_reminder(&reservation.title, reservation.start_at);
        self.send(NotificationKind::ReservationReminder, reservation.id, recipient, rendered)
            .await;
    }

    async fn send(
        &self,
        kind: NotificationKind,
        reservation_id: ReservationId,
        recipient: &str,
        rendered: Rendered,
    ) {
        let now = self.clock.now();
        if self.is_duplicate(kind, reservation_id, now) {
            debug!(kind = kind.key(), %reservation_id, "notification suppressed by dedupe window");
            return;
        }

        let payload = SendEmailPayload {
            to: recipient.to_string(),
            subject: rendered.subject,
            body: rendered.body,
        };
        let payload = match serde_json::to_value(&payload) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "failed to serialize notification payload");
                return;
            }
        };

        let job = Job::new(self.id_gen.new_uuid(), SEND_EMAIL_JOB, payload, now);
        if let Err(e) = self.queue.enqueue(&job).await {
            warn!(kind = kind.key(), %reservation_id, error = %e, "failed to enqueue notification");
        }
    }

    /// Record the send unless one of the same kind happened inside the
    /// window. Oversized caches are purged of stale entries first.
    fn is_duplicate(
        &self,
        kind: NotificationKind,
        reservation_id: ReservationId,
        now: DateTime<Utc>,
    ) -> bool {
        let key = format!("{}_{}", kind.key(), reservation_id);
        let mut cache = self.dedupe.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if cache.len() > DEDUPE_MAX_ENTRIES {
            cache.retain(|_, sent_at| now - *sent_at < Duration::seconds(DEDUPE_MAX_AGE_SECS));
        }

        match cache.get(&key) {
            Some(sent_at) if now - *sent_at < Duration::seconds(DEDUPE_WINDOW_SECS) => true,
            _ => {
                cache.insert(key, now);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::{FixedClock, InMemoryJobQueue, SeqIdGen};

    fn t(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn reservation() -> Reservation {
        use crate::domains::reservations::ApprovalStatus;
        let start = t("2025-06-01T10:00:00Z");
        Reservation {
            id: crate::common::ReservationId::nil(),
            organizer_id: crate::common::UserId::nil(),
            title: "Sync".into(),
            description: None,
            start_at: start,
            end_at: start + Duration::hours(1),
            rrule: None,
            is_private: false,
            timezone: "UTC".into(),
            approval_status: ApprovalStatus::Confirmed,
            version: 1,
            created_at: start,
            updated_at: start,
        }
    }

    #[tokio::test]
    async fn duplicate_sends_inside_window_are_suppressed() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let clock = Arc::new(FixedClock::new(t("2025-06-01T09:00:00Z")));
        let notifier = Notifier::new(queue.clone(), clock.clone(), Arc::new(SeqIdGen::new()));
        let r = reservation();

        notifier.reservation_created(&r, "a@example.com").await;
        notifier.reservation_created(&r, "a@example.com").await;
        assert_eq!(queue.main_len().await, 1);

        // Past the window the same kind goes out again.
        clock.advance(Duration::hours(2));
        notifier.reservation_created(&r, "a@example.com").await;
        assert_eq!(queue.main_len().await, 2);
    }

    #[tokio::test]
    async fn different_kinds_are_not_deduped_against_each_other() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let clock = Arc::new(FixedClock::new(t("2025-06-01T09:00:00Z")));
        let notifier = Notifier::new(queue.clone(), clock, Arc::new(SeqIdGen::new()));
        let r = reservation();

        notifier.reservation_created(&r, "a@example.com").await;
        notifier.reservation_approved(&r, "a@example.com").await;
        assert_eq!(queue.main_len().await, 2);
    }
}
