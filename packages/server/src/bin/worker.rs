//! Queue-worker binary.
//!
//! Runs the worker pool (default five workers) and the delayed-job poller
//! under one service host. Connects to Postgres and Redis up front so
//! misconfiguration fails the process at startup with a non-zero exit.

use std::sync::Arc;

use anyhow::{Context, Result};
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use scheduler_core::common::SystemClock;
use scheduler_core::domains::notifications::{register_handlers, LogMailer};
use scheduler_core::kernel::jobs::{
    DelayedJobPoller, JobRegistry, RedisJobQueue, WorkerPool, WorkerPoolConfig,
};
use scheduler_core::kernel::{ServiceHost, WorkerDeps};
use scheduler_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const NOTIFICATION_QUEUE: &str = "notifications";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,scheduler_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let config = Config::from_env()?;

    // The worker keeps a smaller pool than the API.
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    let redis_client =
        redis::Client::open(config.redis.url.clone()).context("invalid REDIS_URL")?;
    let redis_config = ConnectionManagerConfig::new()
        .set_connection_timeout(config.redis.dial_timeout)
        .set_response_timeout(config.redis.read_timeout);
    let redis = ConnectionManager::new_with_config(redis_client, redis_config)
        .await
        .context("failed to connect to redis")?;

    let clock = Arc::new(SystemClock);
    let queue = Arc::new(RedisJobQueue::new(redis, NOTIFICATION_QUEUE));

    let mut registry = JobRegistry::new();
    register_handlers(&mut registry);
    let registry = Arc::new(registry);
    info!(types = ?registry.registered_types(), "job handlers registered");

    let deps = Arc::new(WorkerDeps::new(Arc::new(LogMailer)));

    let pool_config = WorkerPoolConfig {
        worker_count: config.worker_count,
        ..WorkerPoolConfig::default()
    };
    let workers = WorkerPool::new(queue.clone(), registry, deps, clock.clone())
        .with_config(pool_config);
    let poller = DelayedJobPoller::new(queue, clock);

    ServiceHost::new()
        .with_service(workers)
        .with_service(poller)
        .run_until_shutdown()
        .await?;

    pool.close().await;
    info!("worker shutdown complete");
    Ok(())
}
