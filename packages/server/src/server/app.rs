//! Application state and router assembly.

use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::common::{Clock, IdGen};
use crate::domains::approvals::ApprovalEngine;
use crate::domains::audit::AuditRecorder;
use crate::domains::auth::AuthService;
use crate::domains::reservations::ReservationEngine;
use crate::domains::resources::ResourceStore;
use crate::domains::users::UserStore;
use crate::server::middleware::{
    csrf_middleware, extract_client_meta, rate_limit_middleware, session_auth_middleware,
    RateLimiter,
};
use crate::server::routes::{audit, auth, events, health, resources, users};

/// Shared application state. Engines and stores are wired once at the
/// composition root; handlers reach them through this struct.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub reservations: Arc<ReservationEngine>,
    pub approvals: Arc<ApprovalEngine>,
    pub users: Arc<dyn UserStore>,
    pub resources: Arc<dyn ResourceStore>,
    pub audit: AuditRecorder,
    pub rate_limiter: Arc<RateLimiter>,
    pub clock: Arc<dyn Clock>,
    pub id_gen: Arc<dyn IdGen>,
}

/// Build the axum router.
///
/// Public routes: health and the login/callback pair. Everything else sits
/// behind session auth and the CSRF check. Client-IP extraction and rate
/// limiting wrap the whole surface.
pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            allowed_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok()),
        ))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static("x-csrf-token"),
        ])
        .allow_credentials(true);

    let public = Router::new()
        .route("/api/v1/auth/login", get(auth::login_handler))
        .route("/api/v1/auth/callback", get(auth::callback_handler));

    let protected = Router::new()
        .route("/api/v1/auth/logout", post(auth::logout_handler))
        .route("/api/v1/auth/refresh", post(auth::refresh_handler))
        .route(
            "/api/v1/events",
            post(events::create_event_handler).get(events::list_events_handler),
        )
        .route(
            "/api/v1/events/:id",
            get(events::get_event_handler).delete(events::cancel_event_handler),
        )
        .route("/api/v1/events/:id/approve", post(events::approve_event_handler))
        .route("/api/v1/events/:id/reject", post(events::reject_event_handler))
        .route(
            "/api/v1/resources",
            get(resources::list_resources_handler).post(resources::create_resource_handler),
        )
        .route(
            "/api/v1/resources/available",
            get(resources::available_resources_handler),
        )
        .route(
            "/api/v1/resources/:id",
            get(resources::get_resource_handler)
                .put(resources::update_resource_handler)
                .delete(resources::delete_resource_handler),
        )
        .route("/api/v1/users/me", get(users::me_handler))
        .route("/api/v1/users", get(users::list_users_handler))
        .route("/api/v1/users/:id", get(users::get_user_handler))
        .route("/api/v1/audit", get(audit::list_audit_handler))
        .layer(middleware::from_fn(csrf_middleware))
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            session_auth_middleware,
        ));

    public
        .merge(protected)
        .route("/health", get(health::health_handler))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn(extract_client_meta))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
