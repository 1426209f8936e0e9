//! Delayed-job poller.
//!
//! Retried jobs land on the delayed sorted set with a visible-at score;
//! nothing consumes that set on its own. This service polls once a second
//! and migrates due members back onto the main list, where the worker pool
//! picks them up like any other job.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::queue::JobQueue;
use crate::common::Clock;
use crate::kernel::service_host::Service;

/// Poll interval for the delayed set.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct DelayedJobPoller {
    queue: Arc<dyn JobQueue>,
    clock: Arc<dyn Clock>,
}

impl DelayedJobPoller {
    pub fn new(queue: Arc<dyn JobQueue>, clock: Arc<dyn Clock>) -> Self {
        Self { queue, clock }
    }
}

#[async_trait::async_trait]
impl Service for DelayedJobPoller {
    fn name(&self) -> &'static str {
        "delayed-job-poller"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
        info!("delayed-job poller started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
            }

            match self.queue.promote_due(self.clock.now()).await {
                Ok(0) => {}
                Ok(promoted) => debug!(promoted, "promoted delayed jobs"),
                Err(e) => error!(error = %e, "failed to promote delayed jobs"),
            }
        }
        info!("delayed-job poller stopped");
        Ok(())
    }
}
