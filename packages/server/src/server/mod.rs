//! HTTP surface: router, middleware, routes, and the response envelope.

pub mod app;
pub mod middleware;
pub mod response;
pub mod routes;

pub use app::{build_router, AppState};
