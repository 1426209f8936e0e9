pub mod service;

pub use service::ApprovalEngine;
