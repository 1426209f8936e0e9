pub mod models;
pub mod recorder;
pub mod signer;
pub mod store;

pub use models::{AuditAction, AuditEntry};
pub use recorder::{ActorContext, AuditRecorder};
pub use signer::AuditSigner;
pub use store::{AuditFilter, AuditStore, PgAuditStore};
