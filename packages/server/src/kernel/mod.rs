//! Composition and runtime infrastructure.

pub mod deps;
pub mod jobs;
pub mod service_host;
pub mod test_dependencies;

pub use deps::WorkerDeps;
pub use service_host::{Service, ServiceHost, SHUTDOWN_GRACE};
