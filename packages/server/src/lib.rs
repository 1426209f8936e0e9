//! Core library for the shared meeting-room and equipment scheduler.
//!
//! The crate is organised the same way the service runs:
//!
//! - [`common`] - typed IDs, the error taxonomy, clock/ID-generation seams
//! - [`kernel`] - composition root, service hosting, and the job queue
//! - [`domains`] - users, resources, reservations, approvals, audit, auth,
//!   notifications
//! - [`server`] - the HTTP surface (axum router, middleware, routes)
//!
//! Two binaries compose the pieces: `server` (the API) and `worker` (the
//! queue-worker pool plus the delayed-job poller).

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::Config;
