//! RFC 5545 recurrence expansion.
//!
//! A recurring reservation stores its RRULE anchored at the parent's
//! canonical `start_at`; expansion enumerates occurrence start times inside
//! a window and applies the parent's duration to each.

use chrono::{DateTime, Utc};
use rrule::RRuleSet;

use crate::common::{AppError, AppResult};

/// Upper bound on occurrences returned from a single expansion. Rules that
/// would exceed it are truncated rather than allowed to run away.
const MAX_OCCURRENCES: u16 = 1000;

/// Check that an RRULE parses, without expanding it.
pub fn validate_rrule(rrule: &str, anchor: DateTime<Utc>) -> AppResult<()> {
    parse_set(rrule, anchor).map(|_| ())
}

/// Enumerate occurrence start times of `rrule` anchored at `anchor` that
/// fall inside `[window_start, window_end)`.
///
/// The window is half-open: an occurrence starting exactly at `window_end`
/// is not emitted.
pub fn expand_occurrences(
    rrule: &str,
    anchor: DateTime<Utc>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> AppResult<Vec<DateTime<Utc>>> {
    let set = parse_set(rrule, anchor)?;

    let after = window_start.with_timezone(&rrule::Tz::UTC);
    let before = window_end.with_timezone(&rrule::Tz::UTC);
    let result = set.after(after).before(before).all(MAX_OCCURRENCES);

    Ok(result
        .dates
        .into_iter()
        .map(|d| d.with_timezone(&Utc))
        .filter(|d| *d >= window_start && *d < window_end)
        .collect())
}

fn parse_set(rrule: &str, anchor: DateTime<Utc>) -> AppResult<RRuleSet> {
    let full = format!(
        "DTSTART:{}\nRRULE:{}",
        anchor.format("%Y%m%dT%H%M%SZ"),
        rrule
    );
    full.parse::<RRuleSet>()
        .map_err(|e| AppError::InvalidRecurrenceRule(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn daily_count_expands_to_exactly_count() {
        let anchor = t("2025-01-01T10:00:00Z");
        let occurrences = expand_occurrences(
            "FREQ=DAILY;COUNT=5",
            anchor,
            t("2025-01-01T00:00:00Z"),
            t("2025-01-06T00:00:00Z"),
        )
        .unwrap();

        assert_eq!(occurrences.len(), 5);
        for (day, occurrence) in occurrences.iter().enumerate() {
            assert_eq!(*occurrence, anchor + Duration::days(day as i64));
        }
    }

    #[test]
    fn window_clips_unbounded_rules() {
        let anchor = t("2025-01-01T10:00:00Z");
        let occurrences = expand_occurrences(
            "FREQ=DAILY",
            anchor,
            t("2025-01-03T00:00:00Z"),
            t("2025-01-06T00:00:00Z"),
        )
        .unwrap();

        assert_eq!(
            occurrences,
            vec![
                t("2025-01-03T10:00:00Z"),
                t("2025-01-04T10:00:00Z"),
                t("2025-01-05T10:00:00Z"),
            ]
        );
    }

    #[test]
    fn occurrence_at_window_end_is_excluded() {
        let anchor = t("2025-01-01T10:00:00Z");
        let occurrences = expand_occurrences(
            "FREQ=DAILY;COUNT=3",
            anchor,
            t("2025-01-01T00:00:00Z"),
            t("2025-01-02T10:00:00Z"),
        )
        .unwrap();

        // Jan 2 10:00 equals the window end exactly, so only Jan 1 remains.
        assert_eq!(occurrences, vec![anchor]);
    }

    #[test]
    fn weekly_byday() {
        let anchor = t("2025-01-06T09:00:00Z"); // a Monday
        let occurrences = expand_occurrences(
            "FREQ=WEEKLY;BYDAY=MO;COUNT=3",
            anchor,
            t("2025-01-01T00:00:00Z"),
            t("2025-02-01T00:00:00Z"),
        )
        .unwrap();

        assert_eq!(
            occurrences,
            vec![
                t("2025-01-06T09:00:00Z"),
                t("2025-01-13T09:00:00Z"),
                t("2025-01-20T09:00:00Z"),
            ]
        );
    }

    #[test]
    fn malformed_rule_is_rejected() {
        let anchor = t("2025-01-01T10:00:00Z");
        let err = validate_rrule("FREQ=SOMETIMES", anchor).unwrap_err();
        assert!(matches!(err, AppError::InvalidRecurrenceRule(_)));
    }
}
