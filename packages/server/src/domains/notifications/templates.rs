//! Outbound message templates.

use chrono::{DateTime, Utc};

pub struct Rendered {
    pub subject: String,
    pub body: String,
}

pub fn reservation_created(title: &str, start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> Rendered {
    Rendered {
        subject: format!("Reservation confirmed: {title}"),
        body: format!(
            "Your reservation \"{title}\" is booked from {} to {}.",
            start_at.format("%Y-%m-%d %H:%M UTC"),
            end_at.format("%Y-%m-%d %H:%M UTC"),
        ),
    }
}

pub fn reservation_cancelled(title: &str, start_at: DateTime<Utc>) -> Rendered {
    Rendered {
        subject: format!("Reservation cancelled: {title}"),
        body: format!(
            "The occurrence of \"{title}\" on {} was cancelled.",
            start_at.format("%Y-%m-%d %H:%M UTC"),
        ),
    }
}

pub fn reservation_approved(title: &str) -> Rendered {
    Rendered {
        subject: format!("Reservation approved: {title}"),
        body: format!("Your reservation \"{title}\" has been approved."),
    }
}

pub fn reservation_rejected(title: &str, reason: &str) -> Rendered {
    let body = if reason.is_empty() {
        format!("Your reservation \"{title}\" was rejected.")
    } else {
        format!("Your reservation \"{title}\" was rejected: {reason}")
    };
    Rendered {
        subject: format!("Reservation rejected: {title}"),
        body,
    }
}

pub fn reservation_reminder(title: &str, start_at: DateTime<Utc>) -> Rendered {
    Rendered {
        subject: format!("Upcoming reservation: {title}"),
        body: format!(
            "Reminder: \"{title}\" starts at {}.",
            start_at.format("%Y-%m-%d %H:%M UTC"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_reason_is_included_when_present() {
        let with = reservation_rejected("Board meeting", "room under maintenance");
        assert!(with.body.contains("room under maintenance"));

        let without = reservation_rejected("Board meeting", "");
        assert!(without.body.ends_with("rejected."));
    }
}
