//! Queued job record and retry policy.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default retry budget for a job.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// The wire format stored on the queue. Serialised as JSON:
/// `{id, type, payload, created_at, retry_count, max_retries, last_error?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub job_type: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Job {
    pub fn new(
        id: Uuid,
        job_type: impl Into<String>,
        payload: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            job_type: job_type.into(),
            payload,
            created_at,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            last_error: None,
        }
    }

    /// Record a failed attempt. Returns true when the retry budget is
    /// exhausted and the job belongs on the dead-letter list.
    ///
    /// `max_retries = 3` buys three delayed retries (backing off ~2 s,
    /// ~4 s, ~8 s); the failure after the last retry dead-letters.
    pub fn record_failure(&mut self, error: &str) -> bool {
        self.retry_count += 1;
        self.last_error = Some(error.to_string());
        self.retry_count > self.max_retries
    }
}

/// Exponential backoff with jitter for failed jobs.
///
/// The delay for a job whose `retry_count` has already been incremented is
/// `2^retry_count * base_delay + jitter`, `jitter ∈ [0, base_delay)`. With
/// the 1 s default base the first retry waits ~2 s, the second ~4 s, the
/// third ~8 s.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::seconds(1),
        }
    }
}

impl RetryPolicy {
    /// When a failed job becomes visible again. `jitter_frac` is a uniform
    /// sample from `[0, 1)`; the worker feeds it from `rand`, tests pin it.
    pub fn next_visible_at(
        &self,
        retry_count: u32,
        now: DateTime<Utc>,
        jitter_frac: f64,
    ) -> DateTime<Utc> {
        let backoff = self.base_delay * 2i32.saturating_pow(retry_count.min(16));
        let jitter_ms = (self.base_delay.num_milliseconds() as f64 * jitter_frac) as i64;
        now + backoff + Duration::milliseconds(jitter_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        "2025-01-01T00:00:00Z".parse().unwrap()
    }

    #[test]
    fn wire_format_field_names() {
        let job = Job::new(
            Uuid::nil(),
            "send_email",
            serde_json::json!({"to": "a@example.com"}),
            fixed_now(),
        );
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["type"], "send_email");
        assert_eq!(value["retry_count"], 0);
        assert_eq!(value["max_retries"], 3);
        assert!(value.get("last_error").is_none());
    }

    #[test]
    fn record_failure_counts_up_to_dead_letter() {
        let mut job = Job::new(Uuid::nil(), "t", serde_json::Value::Null, fixed_now());
        assert!(!job.record_failure("boom"));
        assert!(!job.record_failure("boom"));
        assert!(!job.record_failure("boom"));
        assert!(job.record_failure("boom"));
        assert_eq!(job.retry_count, 4);
        assert_eq!(job.last_error.as_deref(), Some("boom"));
    }

    #[test]
    fn backoff_doubles_per_retry() {
        let policy = RetryPolicy::default();
        let now = fixed_now();
        assert_eq!(policy.next_visible_at(1, now, 0.0), now + Duration::seconds(2));
        assert_eq!(policy.next_visible_at(2, now, 0.0), now + Duration::seconds(4));
        assert_eq!(policy.next_visible_at(3, now, 0.0), now + Duration::seconds(8));
    }

    #[test]
    fn backoff_is_monotone_ignoring_jitter() {
        let policy = RetryPolicy::default();
        let now = fixed_now();
        let mut last = now;
        for retry in 1..10 {
            let next = policy.next_visible_at(retry, now, 0.0);
            assert!(next >= last);
            last = next;
        }
    }

    #[test]
    fn jitter_stays_below_base_delay() {
        let policy = RetryPolicy::default();
        let now = fixed_now();
        let low = policy.next_visible_at(1, now, 0.0);
        let high = policy.next_visible_at(1, now, 0.999);
        assert!(high - low < Duration::seconds(1));
    }
}
