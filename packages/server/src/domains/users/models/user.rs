//! User accounts and roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::UserId;

/// Organisation role.
///
/// `General < Manager < Admin` form the permission hierarchy; `Secretary`
/// and `Auditor` sit outside it and satisfy no hierarchy check - they are
/// matched exactly where a gate names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    General,
    Secretary,
    Manager,
    Admin,
    Auditor,
}

impl Role {
    /// Position in the linear hierarchy, if the role is part of it.
    fn rank(self) -> Option<u8> {
        match self {
            Role::General => Some(0),
            Role::Manager => Some(1),
            Role::Admin => Some(2),
            Role::Secretary | Role::Auditor => None,
        }
    }

    /// Whether this role satisfies a `required` gate: an exact match always
    /// passes, otherwise both roles must be in the hierarchy with this one
    /// at or above the requirement.
    pub fn satisfies(self, required: Role) -> bool {
        if self == required {
            return true;
        }
        match (self.rank(), required.rank()) {
            (Some(mine), Some(theirs)) => mine >= theirs,
            _ => false,
        }
    }
}

/// A user account, provisioned on first OIDC login.
///
/// `subject` is the IdP subject string and never changes after creation.
/// Soft deletion clears `is_active` and stamps `deleted_at`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub subject: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub manager_id: Option<UserId>,
    pub penalty_score: i32,
    pub penalty_expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Effective penalty score; expired penalties count as zero.
    pub fn effective_penalty(&self, now: DateTime<Utc>) -> i32 {
        match self.penalty_expires_at {
            Some(expires_at) if expires_at <= now => 0,
            _ => self.penalty_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_is_linear_for_general_manager_admin() {
        assert!(Role::Admin.satisfies(Role::General));
        assert!(Role::Admin.satisfies(Role::Manager));
        assert!(Role::Manager.satisfies(Role::General));
        assert!(!Role::General.satisfies(Role::Manager));
        assert!(!Role::Manager.satisfies(Role::Admin));
    }

    #[test]
    fn secretary_and_auditor_satisfy_no_hierarchy_check() {
        for outsider in [Role::Secretary, Role::Auditor] {
            assert!(!outsider.satisfies(Role::General));
            assert!(!outsider.satisfies(Role::Manager));
            assert!(!outsider.satisfies(Role::Admin));
            assert!(!Role::Admin.satisfies(outsider));
        }
    }

    #[test]
    fn exact_match_always_passes() {
        assert!(Role::Secretary.satisfies(Role::Secretary));
        assert!(Role::Auditor.satisfies(Role::Auditor));
    }

    #[test]
    fn expired_penalty_counts_as_zero() {
        let now: DateTime<Utc> = "2025-06-01T00:00:00Z".parse().unwrap();
        let user = User {
            id: UserId::nil(),
            subject: "sub".into(),
            email: "a@example.com".into(),
            display_name: "A".into(),
            role: Role::General,
            manager_id: None,
            penalty_score: 3,
            penalty_expires_at: Some(now - chrono::Duration::days(1)),
            is_active: true,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(user.effective_penalty(now), 0);

        let live = User {
            penalty_expires_at: Some(now + chrono::Duration::days(1)),
            ..user
        };
        assert_eq!(live.effective_penalty(now), 3);
    }
}
