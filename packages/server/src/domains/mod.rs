//! Domain modules: one directory per bounded concern.

pub mod approvals;
pub mod audit;
pub mod auth;
pub mod notifications;
pub mod reservations;
pub mod resources;
pub mod users;
