//! Reservation parents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{AppError, AppResult, ReservationId, UserId};

/// Approval workflow state. `Pending` is the only non-terminal state;
/// `Confirmed` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "approval_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl ApprovalStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ApprovalStatus::Confirmed | ApprovalStatus::Rejected)
    }
}

/// A booking record, single-shot or recurring.
///
/// `start_at`/`end_at` describe the first occurrence; for recurring series
/// the RRULE (RFC 5545) is anchored at `start_at` and every child instance
/// carries `start_at` back as its `reservation_start_at` partition key.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reservation {
    pub id: ReservationId,
    pub organizer_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub rrule: Option<String>,
    pub is_private: bool,
    pub timezone: String,
    pub approval_status: ApprovalStatus,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Validate the canonical time range and timezone.
    pub fn validate(&self) -> AppResult<()> {
        if self.start_at >= self.end_at {
            return Err(AppError::InvalidTimeRange);
        }
        if self.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(AppError::InvalidTimezone(self.timezone.clone()));
        }
        Ok(())
    }

    /// Duration of one occurrence.
    pub fn duration(&self) -> chrono::Duration {
        self.end_at - self.start_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reservation(timezone: &str) -> Reservation {
        let start: DateTime<Utc> = "2025-06-01T10:00:00Z".parse().unwrap();
        Reservation {
            id: ReservationId::nil(),
            organizer_id: UserId::nil(),
            title: "Weekly sync".into(),
            description: None,
            start_at: start,
            end_at: start + chrono::Duration::hours(1),
            rrule: None,
            is_private: false,
            timezone: timezone.into(),
            approval_status: ApprovalStatus::Confirmed,
            version: 1,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn valid_range_and_timezone_pass() {
        assert!(reservation("Asia/Tokyo").validate().is_ok());
    }

    #[test]
    fn rejects_inverted_range() {
        let mut r = reservation("UTC");
        r.end_at = r.start_at;
        assert!(matches!(r.validate(), Err(AppError::InvalidTimeRange)));
    }

    #[test]
    fn rejects_unknown_timezone() {
        let r = reservation("Mars/Olympus_Mons");
        assert!(matches!(r.validate(), Err(AppError::InvalidTimezone(_))));
    }

    #[test]
    fn terminality() {
        assert!(!ApprovalStatus::Pending.is_terminal());
        assert!(ApprovalStatus::Confirmed.is_terminal());
        assert!(ApprovalStatus::Rejected.is_terminal());
    }
}
