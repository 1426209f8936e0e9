//! Worker pool draining the job queue.
//!
//! N worker tasks share the queue and a root cancellation token. Each
//! worker loops: poll for a job; sleep ~1 s when the queue is empty;
//! otherwise dispatch the job by type through the registry. Failures feed
//! the retry policy: the retry count is incremented, exhausted jobs go to
//! the dead-letter list, and everything else is parked on the delayed set
//! with exponential backoff. In-flight jobs finish during the host's
//! shutdown grace window.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::job::{Job, RetryPolicy};
use super::queue::JobQueue;
use super::registry::SharedJobRegistry;
use crate::common::Clock;
use crate::kernel::deps::WorkerDeps;
use crate::kernel::service_host::Service;

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of concurrent worker tasks.
    pub worker_count: usize,
    /// Sleep between polls when the queue is empty.
    pub idle_sleep: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 5,
            idle_sleep: Duration::from_secs(1),
        }
    }
}

/// Pool of queue workers hosted as a single service.
pub struct WorkerPool {
    queue: Arc<dyn JobQueue>,
    registry: SharedJobRegistry,
    deps: Arc<WorkerDeps>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    config: WorkerPoolConfig,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        registry: SharedJobRegistry,
        deps: Arc<WorkerDeps>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            queue,
            registry,
            deps,
            clock,
            policy: RetryPolicy::default(),
            config: WorkerPoolConfig::default(),
        }
    }

    pub fn with_config(mut self, config: WorkerPoolConfig) -> Self {
        self.config = config;
        self
    }

    async fn worker_loop(
        worker_index: usize,
        queue: Arc<dyn JobQueue>,
        registry: SharedJobRegistry,
        deps: Arc<WorkerDeps>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
        idle_sleep: Duration,
        shutdown: CancellationToken,
    ) {
        info!(worker = worker_index, "queue worker started");
        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let job = match queue.dequeue().await {
                Ok(job) => job,
                Err(e) => {
                    error!(worker = worker_index, error = %e, "failed to poll queue");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(idle_sleep) => continue,
                    }
                }
            };

            let Some(job) = job else {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(idle_sleep) => {}
                }
                continue;
            };

            let job_id = job.id;
            let job_type = job.job_type.clone();
            debug!(worker = worker_index, job_id = %job_id, job_type = %job_type, "executing job");

            match registry.execute(&job, deps.clone()).await {
                Ok(()) => {
                    debug!(job_id = %job_id, job_type = %job_type, "job succeeded");
                }
                Err(e) => {
                    warn!(job_id = %job_id, job_type = %job_type, error = %e, "job failed");
                    if let Err(requeue_err) =
                        handle_failure(queue.as_ref(), &policy, clock.as_ref(), job, &e.to_string())
                            .await
                    {
                        error!(job_id = %job_id, error = %requeue_err, "failed to requeue job");
                    }
                }
            }
        }
        info!(worker = worker_index, "queue worker stopped");
    }
}

/// Apply the retry policy to a failed job: increment the retry count, move
/// exhausted jobs to the DLQ, and park the rest on the delayed set at
/// `now + 2^retry_count * base + jitter`.
pub async fn handle_failure(
    queue: &dyn JobQueue,
    policy: &RetryPolicy,
    clock: &dyn Clock,
    mut job: Job,
    error: &str,
) -> crate::common::AppResult<()> {
    if job.record_failure(error) {
        return queue.dead_letter(&job).await;
    }
    let jitter_frac = rand::thread_rng().gen_range(0.0..1.0);
    let visible_at = policy.next_visible_at(job.retry_count, clock.now(), jitter_frac);
    queue.enqueue_delayed(&job, visible_at).await
}

#[async_trait::async_trait]
impl Service for WorkerPool {
    fn name(&self) -> &'static str {
        "worker-pool"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
        info!(worker_count = self.config.worker_count, "worker pool starting");

        let mut workers = JoinSet::new();
        for index in 0..self.config.worker_count {
            workers.spawn(Self::worker_loop(
                index,
                self.queue.clone(),
                self.registry.clone(),
                self.deps.clone(),
                self.clock.clone(),
                self.policy,
                self.config.idle_sleep,
                shutdown.clone(),
            ));
        }

        while workers.join_next().await.is_some() {}
        info!("worker pool stopped");
        Ok(())
    }
}
