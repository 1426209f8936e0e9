mod entry;

pub use entry::{AuditAction, AuditEntry};
