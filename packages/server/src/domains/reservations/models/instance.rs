//! Concrete reservation occurrences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{InstanceId, ReservationId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "instance_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Confirmed,
    Cancelled,
    CheckedIn,
    Completed,
    NoShow,
}

/// One occurrence of a reservation.
///
/// `reservation_start_at` copies the parent's canonical start and doubles
/// as the partition key for year-sharded instance tables.
/// `original_start_at` records the pre-move start for recurrence
/// exceptions.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReservationInstance {
    pub id: InstanceId,
    pub reservation_id: ReservationId,
    pub reservation_start_at: DateTime<Utc>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub original_start_at: Option<DateTime<Utc>>,
    pub status: InstanceStatus,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ReservationInstance {
    /// Half-open interval overlap: touching intervals do not conflict.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        intervals_overlap(self.start_at, self.end_at, start, end)
    }
}

/// `[a_start, a_end)` and `[b_start, b_end)` overlap iff each starts before
/// the other ends.
pub fn intervals_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && a_end > b_start
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn overlapping_intervals_conflict() {
        assert!(intervals_overlap(
            t("2025-06-01T10:00:00Z"),
            t("2025-06-01T11:00:00Z"),
            t("2025-06-01T10:30:00Z"),
            t("2025-06-01T11:30:00Z"),
        ));
    }

    #[test]
    fn touching_intervals_do_not_conflict() {
        assert!(!intervals_overlap(
            t("2025-06-01T10:00:00Z"),
            t("2025-06-01T11:00:00Z"),
            t("2025-06-01T11:00:00Z"),
            t("2025-06-01T12:00:00Z"),
        ));
        assert!(!intervals_overlap(
            t("2025-06-01T11:00:00Z"),
            t("2025-06-01T12:00:00Z"),
            t("2025-06-01T10:00:00Z"),
            t("2025-06-01T11:00:00Z"),
        ));
    }

    #[test]
    fn containment_conflicts() {
        assert!(intervals_overlap(
            t("2025-06-01T09:00:00Z"),
            t("2025-06-01T12:00:00Z"),
            t("2025-06-01T10:00:00Z"),
            t("2025-06-01T11:00:00Z"),
        ));
    }
}
