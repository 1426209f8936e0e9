//! API server binary.
//!
//! Composition root: configuration, Postgres pool, Redis queue, OIDC
//! provider, engines, router. Exits non-zero when any of those fail to
//! initialise; drains in-flight requests for up to 30 s on shutdown and
//! closes the database pool last.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use scheduler_core::common::{RandomIdGen, SystemClock};
use scheduler_core::domains::approvals::ApprovalEngine;
use scheduler_core::domains::audit::{AuditRecorder, AuditSigner, PgAuditStore};
use scheduler_core::domains::auth::{AuthService, HttpOidcProvider, SessionStore};
use scheduler_core::domains::notifications::Notifier;
use scheduler_core::domains::reservations::{
    BookingPolicy, DirectBooking, LateCancelPolicy, PgReservationStore, RequireApproval,
    ReservationEngine,
};
use scheduler_core::domains::resources::PgResourceStore;
use scheduler_core::domains::users::PgUserStore;
use scheduler_core::kernel::jobs::RedisJobQueue;
use scheduler_core::kernel::SHUTDOWN_GRACE;
use scheduler_core::server::middleware::RateLimiter;
use scheduler_core::server::{build_router, AppState};
use scheduler_core::Config;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Queue drained by the notification workers.
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

    let pool = PgPoolOptions::new()
        .max_connections(25)
        .min_connections(5)
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
    let id_gen = Arc::new(RandomIdGen);

    let users = Arc::new(PgUserStore::new(pool.clone()));
    let resources = Arc::new(PgResourceStore::new(pool.clone()));
    let reservations = Arc::new(PgReservationStore::new(pool.clone()));
    let audit_store = Arc::new(PgAuditStore::new(pool.clone()));

    let audit = AuditRecorder::new(
        audit_store,
        AuditSigner::new(&config.audit_secret),
        clock.clone(),
        id_gen.clone(),
    );

    let queue = Arc::new(RedisJobQueue::new(redis, NOTIFICATION_QUEUE));
    let notifier = Arc::new(Notifier::new(queue, clock.clone(), id_gen.clone()));

    let booking_policy: Arc<dyn BookingPolicy> = if config.require_approval {
        Arc::new(RequireApproval)
    } else {
        Arc::new(DirectBooking)
    };

    let engine = Arc::new(ReservationEngine::new(
        reservations.clone(),
        resources.clone(),
        users.clone(),
        audit.clone(),
        notifier.clone(),
        clock.clone(),
        id_gen.clone(),
        booking_policy,
        Arc::new(LateCancelPolicy::default()),
    ));
    let approvals = Arc::new(ApprovalEngine::new(
        reservations,
        users.clone(),
        audit.clone(),
        notifier,
    ));

    let provider = Arc::new(HttpOidcProvider::new(config.oidc.clone()));
    let auth = Arc::new(AuthService::new(
        provider,
        Arc::new(SessionStore::new()),
        users.clone(),
        audit.clone(),
        clock.clone(),
        id_gen.clone(),
        config.oidc.issuer.clone(),
        config.oidc.client_id.clone(),
        config.oidc.redirect_url.clone(),
    ));

    let state = AppState {
        auth: auth.clone(),
        reservations: engine,
        approvals,
        users,
        resources,
        audit,
        rate_limiter: Arc::new(RateLimiter::new(clock.clone())),
        clock,
        id_gen,
    };
    let app = build_router(state, &config.allowed_origins);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            info!("shutdown signal received");
            shutdown.cancel();
        });
    }

    // Periodic sweep of expired sessions and stale login states.
    {
        let auth = auth.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => auth.cleanup_expired().await,
                }
            }
        });
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "server listening");

    let serve = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown({
        let shutdown = shutdown.clone();
        async move { shutdown.cancelled().await }
    });

    // Cap the drain at the shared grace window.
    tokio::select! {
        result = serve => result.context("server error")?,
        _ = async {
            shutdown.cancelled().await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        } => {
            info!(grace_secs = SHUTDOWN_GRACE.as_secs(), "drain grace elapsed, shutting down");
        }
    }

    // The pool closes last so draining requests keep their connections.
    pool.close().await;
    info!("shutdown complete");
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
