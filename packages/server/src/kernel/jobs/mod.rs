//! Durable job queue: record format, Redis storage, worker pool, and the
//! delayed-set poller.

pub mod delayed;
pub mod job;
pub mod queue;
pub mod registry;
pub mod worker;

pub use delayed::DelayedJobPoller;
pub use job::{Job, RetryPolicy, DEFAULT_MAX_RETRIES};
pub use queue::{JobQueue, RedisJobQueue};
pub use registry::{JobRegistry, SharedJobRegistry};
pub use worker::{handle_failure, WorkerPool, WorkerPoolConfig};
