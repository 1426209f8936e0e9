//! Audit entries and their canonical serialisation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{AuditEntryId, UserId};

/// Audited verbs. The details mapping carries verb-specific data; there is
/// one flat enum rather than per-verb types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "audit_action", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Cancel,
    Approve,
    Reject,
    Login,
    Logout,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Cancel => "CANCEL",
            AuditAction::Approve => "APPROVE",
            AuditAction::Reject => "REJECT",
            AuditAction::Login => "LOGIN",
            AuditAction::Logout => "LOGOUT",
        };
        write!(f, "{s}")
    }
}

/// One append-only audit record.
///
/// The signature covers the canonical serialisation of every other field;
/// any mutation after signing is detectable.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub actor_user_id: UserId,
    pub action: AuditAction,
    pub target_type: String,
    pub target_id: String,
    pub details: serde_json::Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub signature: String,
}

impl AuditEntry {
    /// Canonical serialisation:
    /// `id:userId:action:targetType:targetId:json(details):createdAtNanos:ip:ua`.
    ///
    /// `serde_json` renders maps with sorted keys, so the details component
    /// is stable across sign and verify.
    pub fn canonical(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}:{}:{}:{}",
            self.id,
            self.actor_user_id,
            self.action,
            self.target_type,
            self.target_id,
            serde_json::to_string(&self.details).unwrap_or_else(|_| "null".into()),
            self.created_at.timestamp_nanos_opt().unwrap_or_default(),
            self.ip_address.as_deref().unwrap_or(""),
            self.user_agent.as_deref().unwrap_or(""),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_is_stable_and_field_sensitive() {
        let now: DateTime<Utc> = "2025-06-01T10:00:00Z".parse().unwrap();
        let entry = AuditEntry {
            id: AuditEntryId::nil(),
            actor_user_id: UserId::nil(),
            action: AuditAction::Create,
            target_type: "reservation".into(),
            target_id: "r-1".into(),
            details: serde_json::json!({"title": "Sync", "count": 1}),
            ip_address: Some("10.0.0.1".into()),
            user_agent: Some("curl/8".into()),
            created_at: now,
            signature: String::new(),
        };

        let canonical = entry.canonical();
        assert_eq!(canonical, entry.canonical());
        assert!(canonical.contains(":CREATE:"));
        assert!(canonical.contains(":reservation:r-1:"));

        let mut tampered = entry.clone();
        tampered.target_id = "r-2".into();
        assert_ne!(canonical, tampered.canonical());
    }
}
