//! HMAC signatures over audit entries.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::models::AuditEntry;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies audit entries with a configured secret key.
/// Key rotation is not supported; the key comes from configuration.
#[derive(Clone)]
pub struct AuditSigner {
    key: Vec<u8>,
}

impl AuditSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: secret.as_ref().to_vec(),
        }
    }

    /// `hex(HMAC-SHA256(key, canonical))`.
    pub fn sign(&self, entry: &AuditEntry) -> String {
        // HMAC accepts keys of any length.
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(entry.canonical().as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Replay the canonical serialisation and compare signatures in
    /// constant time.
    pub fn verify(&self, entry: &AuditEntry) -> bool {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(entry.canonical().as_bytes());
        match hex::decode(&entry.signature) {
            Ok(sig) => mac.verify_slice(&sig).is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{AuditEntryId, UserId};
    use crate::domains::audit::models::AuditAction;
    use chrono::{DateTime, Utc};

    fn entry() -> AuditEntry {
        let now: DateTime<Utc> = "2025-06-01T10:00:00Z".parse().unwrap();
        AuditEntry {
            id: AuditEntryId::nil(),
            actor_user_id: UserId::nil(),
            action: AuditAction::Login,
            target_type: "user".into(),
            target_id: "u-1".into(),
            details: serde_json::json!({}),
            ip_address: None,
            user_agent: None,
            created_at: now,
            signature: String::new(),
        }
    }

    #[test]
    fn sign_verify_roundtrip() {
        let signer = AuditSigner::new("secret-key");
        let mut e = entry();
        e.signature = signer.sign(&e);
        assert!(signer.verify(&e));
    }

    #[test]
    fn any_field_mutation_invalidates() {
        let signer = AuditSigner::new("secret-key");
        let mut e = entry();
        e.signature = signer.sign(&e);

        let mut tampered = e.clone();
        tampered.action = AuditAction::Logout;
        assert!(!signer.verify(&tampered));

        let mut tampered = e.clone();
        tampered.target_id = "u-2".into();
        assert!(!signer.verify(&tampered));

        let mut tampered = e.clone();
        tampered.details = serde_json::json!({"x": 1});
        assert!(!signer.verify(&tampered));

        let mut tampered = e.clone();
        tampered.created_at += chrono::Duration::nanoseconds(1);
        assert!(!signer.verify(&tampered));
    }

    #[test]
    fn wrong_key_fails() {
        let signer = AuditSigner::new("secret-key");
        let other = AuditSigner::new("other-key");
        let mut e = entry();
        e.signature = signer.sign(&e);
        assert!(!other.verify(&e));
    }

    #[test]
    fn garbage_signature_fails_closed() {
        let signer = AuditSigner::new("secret-key");
        let mut e = entry();
        e.signature = "not-hex".into();
        assert!(!signer.verify(&e));
    }
}
