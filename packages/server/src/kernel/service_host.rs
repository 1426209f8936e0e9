//! Long-running service hosting with cooperative shutdown.
//!
//! Background services (queue workers, the delayed-job poller) implement
//! [`Service`] and are run by a [`ServiceHost`], which owns the root
//! cancellation token. On shutdown the host cancels the token and gives
//! every service a grace window to drain in-flight work before the process
//! proceeds.

use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Grace window for services to finish in-flight work after cancellation.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// A long-running background service.
#[async_trait::async_trait]
pub trait Service: Send {
    fn name(&self) -> &'static str;

    /// Run until `shutdown` is cancelled. Implementations must observe the
    /// token at every suspension point; the host will not wait past the
    /// grace window.
    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()>;
}

/// Hosts a set of services under one root cancellation token.
pub struct ServiceHost {
    services: Vec<Box<dyn Service>>,
    shutdown: CancellationToken,
}

impl ServiceHost {
    pub fn new() -> Self {
        Self {
            services: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_service(mut self, service: impl Service + 'static) -> Self {
        self.services.push(Box::new(service));
        self
    }

    /// The root token; clone it to wire sub-components to the same signal.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run all services until a shutdown signal (SIGINT/SIGTERM) arrives,
    /// then drain within [`SHUTDOWN_GRACE`].
    pub async fn run_until_shutdown(self) -> Result<()> {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            info!("shutdown signal received");
            shutdown.cancel();
        });
        self.run().await
    }

    /// Run all services until the root token is cancelled externally.
    pub async fn run(self) -> Result<()> {
        let mut tasks = JoinSet::new();
        for service in self.services {
            let name = service.name();
            let token = self.shutdown.clone();
            tasks.spawn(async move {
                info!(service = name, "service starting");
                if let Err(e) = service.run(token).await {
                    error!(service = name, error = %e, "service exited with error");
                }
                info!(service = name, "service stopped");
            });
        }

        self.shutdown.cancelled().await;

        // Drain within the grace window, then proceed regardless.
        if tokio::time::timeout(SHUTDOWN_GRACE, async {
            while tasks.join_next().await.is_some() {}
        })
        .await
        .is_err()
        {
            warn!(
                grace_secs = SHUTDOWN_GRACE.as_secs(),
                "services did not drain within grace window, aborting remainder"
            );
            tasks.abort_all();
        }

        Ok(())
    }
}

impl Default for ServiceHost {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct Flagger {
        stopped: Arc<AtomicBool>,
    }

    #[async_trait::async_trait]
    impl Service for Flagger {
        fn name(&self) -> &'static str {
            "flagger"
        }

        async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
            shutdown.cancelled().await;
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn cancelling_root_token_stops_services() {
        let stopped = Arc::new(AtomicBool::new(false));
        let host = ServiceHost::new().with_service(Flagger {
            stopped: stopped.clone(),
        });
        let token = host.shutdown_token();

        let handle = tokio::spawn(host.run());
        tokio::task::yield_now().await;
        token.cancel();
        handle.await.unwrap().unwrap();

        assert!(stopped.load(Ordering::SeqCst));
    }
}
