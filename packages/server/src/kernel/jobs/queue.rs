//! Durable FIFO job queue over Redis.
//!
//! Three keys per logical queue:
//!
//! - `queue:<name>` - the main list; enqueue LPUSHes, dequeue RPOPs, which
//!   yields FIFO order for inserted items
//! - `queue:<name>:delayed` - sorted set scored by unix-second visible-at;
//!   the delayed poller migrates due members back onto the main list
//! - `queue:<name>:dlq` - dead-letter list for jobs that exhausted their
//!   retry budget
//!
//! The trait is the seam the notifier and worker pool are written against;
//! `kernel::test_dependencies` provides the in-memory implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

use super::job::Job;
use crate::common::{AppError, AppResult};

/// Queue operations used by producers (notifier), consumers (worker pool),
/// and the delayed poller.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Push a job onto the head of the main list.
    async fn enqueue(&self, job: &Job) -> AppResult<()>;

    /// Pop the oldest job off the tail of the main list.
    async fn dequeue(&self) -> AppResult<Option<Job>>;

    /// Park a failed job on the delayed set until `visible_at`.
    async fn enqueue_delayed(&self, job: &Job, visible_at: DateTime<Utc>) -> AppResult<()>;

    /// Move a job to the dead-letter list.
    async fn dead_letter(&self, job: &Job) -> AppResult<()>;

    /// Migrate delayed jobs whose visible-at has passed back onto the main
    /// list. Returns how many were promoted.
    async fn promote_due(&self, now: DateTime<Utc>) -> AppResult<usize>;
}

fn encode(job: &Job) -> AppResult<String> {
    serde_json::to_string(job).map_err(|e| AppError::Queue(format!("encode job: {e}")))
}

fn decode(raw: &str) -> AppResult<Job> {
    serde_json::from_str(raw).map_err(|e| AppError::Queue(format!("decode job: {e}")))
}

/// Redis-backed implementation.
pub struct RedisJobQueue {
    conn: ConnectionManager,
    main_key: String,
    delayed_key: String,
    dlq_key: String,
}

impl RedisJobQueue {
    pub fn new(conn: ConnectionManager, name: &str) -> Self {
        Self {
            conn,
            main_key: format!("queue:{name}"),
            delayed_key: format!("queue:{name}:delayed"),
            dlq_key: format!("queue:{name}:dlq"),
        }
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: &Job) -> AppResult<()> {
        let payload = encode(job)?;
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(&self.main_key, payload)
            .await
            .map_err(|e| AppError::Queue(e.to_string()))?;
        debug!(job_id = %job.id, job_type = %job.job_type, "job enqueued");
        Ok(())
    }

    async fn dequeue(&self) -> AppResult<Option<Job>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .rpop(&self.main_key, None)
            .await
            .map_err(|e| AppError::Queue(e.to_string()))?;
        raw.as_deref().map(decode).transpose()
    }

    async fn enqueue_delayed(&self, job: &Job, visible_at: DateTime<Utc>) -> AppResult<()> {
        let payload = encode(job)?;
        let mut conn = self.conn.clone();
        conn.zadd::<_, _, _, ()>(&self.delayed_key, payload, visible_at.timestamp())
            .await
            .map_err(|e| AppError::Queue(e.to_string()))?;
        debug!(job_id = %job.id, visible_at = %visible_at, "job parked on delayed set");
        Ok(())
    }

    async fn dead_letter(&self, job: &Job) -> AppResult<()> {
        let payload = encode(job)?;
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(&self.dlq_key, payload)
            .await
            .map_err(|e| AppError::Queue(e.to_string()))?;
        debug!(job_id = %job.id, retry_count = job.retry_count, "job dead-lettered");
        Ok(())
    }

    async fn promote_due(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let mut conn = self.conn.clone();
        let due: Vec<String> = conn
            .zrangebyscore(&self.delayed_key, 0, now.timestamp())
            .await
            .map_err(|e| AppError::Queue(e.to_string()))?;

        let mut promoted = 0;
        for payload in due {
            // ZREM first so a concurrent poller cannot promote the same
            // member twice.
            let removed: i64 = conn
                .zrem(&self.delayed_key, &payload)
                .await
                .map_err(|e| AppError::Queue(e.to_string()))?;
            if removed == 0 {
                continue;
            }
            conn.lpush::<_, _, ()>(&self.main_key, &payload)
                .await
                .map_err(|e| AppError::Queue(e.to_string()))?;
            promoted += 1;
        }
        Ok(promoted)
    }
}
