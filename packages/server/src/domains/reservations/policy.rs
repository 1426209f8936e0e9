//! Booking and cancellation policy hooks.
//!
//! Deployments differ on whether bookings confirm directly and on how
//! late cancellations are penalised; both decisions sit behind traits so
//! the engine stays policy-free.

use chrono::{DateTime, Duration, Utc};

use super::models::ApprovalStatus;
use crate::domains::resources::Resource;
use crate::domains::users::User;

/// Decides the initial approval status of a new booking.
pub trait BookingPolicy: Send + Sync {
    fn initial_status(&self, organizer: &User, resources: &[Resource]) -> ApprovalStatus;
}

/// Book directly as CONFIRMED.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectBooking;

impl BookingPolicy for DirectBooking {
    fn initial_status(&self, _organizer: &User, _resources: &[Resource]) -> ApprovalStatus {
        ApprovalStatus::Confirmed
    }
}

/// Every booking enters the approval workflow as PENDING.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireApproval;

impl BookingPolicy for RequireApproval {
    fn initial_status(&self, _organizer: &User, _resources: &[Resource]) -> ApprovalStatus {
        ApprovalStatus::Pending
    }
}

/// A penalty to apply to the organiser's account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Penalty {
    pub points: i32,
    pub expires_at: DateTime<Utc>,
}

/// Decides whether cancelling an occurrence draws a penalty.
pub trait CancellationPolicy: Send + Sync {
    fn penalty_for(&self, now: DateTime<Utc>, instance_start_at: DateTime<Utc>) -> Option<Penalty>;
}

/// Cancelling inside the window before the occurrence start costs one
/// point that expires after the configured TTL.
#[derive(Debug, Clone, Copy)]
pub struct LateCancelPolicy {
    pub window: Duration,
    pub points: i32,
    pub penalty_ttl: Duration,
}

impl Default for LateCancelPolicy {
    fn default() -> Self {
        Self {
            window: Duration::hours(24),
            points: 1,
            penalty_ttl: Duration::days(30),
        }
    }
}

impl CancellationPolicy for LateCancelPolicy {
    fn penalty_for(&self, now: DateTime<Utc>, instance_start_at: DateTime<Utc>) -> Option<Penalty> {
        if now >= instance_start_at - self.window && now < instance_start_at {
            Some(Penalty {
                points: self.points,
                expires_at: now + self.penalty_ttl,
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn late_cancel_inside_window_is_penalised() {
        let policy = LateCancelPolicy::default();
        let start = t("2025-06-02T10:00:00Z");

        let penalty = policy.penalty_for(t("2025-06-02T08:00:00Z"), start);
        assert_eq!(penalty.map(|p| p.points), Some(1));
    }

    #[test]
    fn early_cancel_is_free() {
        let policy = LateCancelPolicy::default();
        let start = t("2025-06-02T10:00:00Z");
        assert!(policy.penalty_for(t("2025-05-20T10:00:00Z"), start).is_none());
    }

    #[test]
    fn cancelling_after_start_is_not_a_late_cancel() {
        // Cancellation after the occurrence began is no-show territory,
        // handled by instance status, not this policy.
        let policy = LateCancelPolicy::default();
        let start = t("2025-06-02T10:00:00Z");
        assert!(policy.penalty_for(t("2025-06-02T11:00:00Z"), start).is_none());
    }
}
