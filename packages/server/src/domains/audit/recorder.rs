//! Fire-and-forget audit recording.
//!
//! Primary writes never fail because the audit log does: `record` signs and
//! appends, and logs (rather than propagates) storage errors. Reads go
//! through [`AuditRecorder::list`] for the compliance endpoint.

use std::sync::Arc;

use tracing::error;

use super::models::{AuditAction, AuditEntry};
use super::signer::AuditSigner;
use super::store::{AuditFilter, AuditStore};
use crate::common::pagination::Page;
use crate::common::{AppResult, AuditEntryId, Clock, IdGen, UserId};

/// Who did it, and from where. Built by the HTTP layer per request.
#[derive(Debug, Clone)]
pub struct ActorContext {
    pub user_id: UserId,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ActorContext {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            ip_address: None,
            user_agent: None,
        }
    }
}

#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
    signer: AuditSigner,
    clock: Arc<dyn Clock>,
    id_gen: Arc<dyn IdGen>,
}

impl AuditRecorder {
    pub fn new(
        store: Arc<dyn AuditStore>,
        signer: AuditSigner,
        clock: Arc<dyn Clock>,
        id_gen: Arc<dyn IdGen>,
    ) -> Self {
        Self {
            store,
            signer,
            clock,
            id_gen,
        }
    }

    /// Sign and append one entry. Failures are logged and swallowed so the
    /// primary write path is never rolled back by audit trouble.
    pub async fn record(
        &self,
        actor: &ActorContext,
        action: AuditAction,
        target_type: &str,
        target_id: &str,
        details: serde_json::Value,
    ) {
        let mut entry = AuditEntry {
            id: AuditEntryId::from_uuid(self.id_gen.new_uuid()),
            actor_user_id: actor.user_id,
            action,
            target_type: target_type.to_string(),
            target_id: target_id.to_string(),
            details,
            ip_address: actor.ip_address.clone(),
            user_agent: actor.user_agent.clone(),
            created_at: self.clock.now(),
            signature: String::new(),
        };
        entry.signature = self.signer.sign(&entry);

        if let Err(e) = self.store.append(&entry).await {
            error!(
                action = %action,
                target_type,
                target_id,
                error = %e,
                "failed to append audit entry"
            );
        }
    }

    pub async fn list(&self, filter: &AuditFilter, page: Page) -> AppResult<Vec<AuditEntry>> {
        self.store.list(filter, page).await
    }

    /// Verify a previously stored entry against the current key.
    pub fn verify(&self, entry: &AuditEntry) -> bool {
        self.signer.verify(entry)
    }
}
