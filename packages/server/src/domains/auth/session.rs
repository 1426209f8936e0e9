//! In-memory session and login-state storage.
//!
//! Four maps live behind one reader-writer lock: sessions, and the
//! state/verifier/nonce triple for logins in flight. `get` dominates the
//! read path; login, logout, and cleanup take the write half. A login
//! state is consumed on first use; taking it removes all three entries
//! under one write lock.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::common::{AppError, AppResult, UserId};
use crate::domains::users::Role;

/// Pending login states expire after ten minutes.
const STATE_TTL_SECS: i64 = 10 * 60;

pub type SessionId = String;

/// An authenticated session. User fields needed for authorisation are
/// copied at issuance so expiry checks never need a user lookup.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, Session>,
    states: HashMap<String, DateTime<Utc>>,
    verifiers: HashMap<String, String>,
    nonces: HashMap<String, String>,
}

#[derive(Default)]
pub struct SessionStore {
    inner: RwLock<Inner>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a login in flight under its `state`.
    pub async fn begin_login(
        &self,
        state: &str,
        code_verifier: &str,
        nonce: &str,
        now: DateTime<Utc>,
    ) {
        let mut inner = self.inner.write().await;
        inner.states.insert(state.to_string(), now);
        inner
            .verifiers
            .insert(state.to_string(), code_verifier.to_string());
        inner.nonces.insert(state.to_string(), nonce.to_string());
    }

    /// Consume a pending login: the state must exist and be unexpired, and
    /// state, verifier, and nonce are all removed in one critical section
    /// so the state cannot be accepted twice.
    pub async fn take_login(
        &self,
        state: &str,
        now: DateTime<Utc>,
    ) -> AppResult<(String, String)> {
        let mut inner = self.inner.write().await;

        let created_at = inner.states.remove(state).ok_or(AppError::InvalidState)?;
        let verifier = inner.verifiers.remove(state);
        let nonce = inner.nonces.remove(state);

        if now - created_at > Duration::seconds(STATE_TTL_SECS) {
            return Err(AppError::InvalidState);
        }
        match (verifier, nonce) {
            (Some(verifier), Some(nonce)) => Ok((verifier, nonce)),
            _ => Err(AppError::InvalidState),
        }
    }

    pub async fn insert(&self, id: SessionId, session: Session) {
        let mut inner = self.inner.write().await;
        inner.sessions.insert(id, session);
    }

    /// Fetch a live session; expired entries are removed on the spot.
    pub async fn get(&self, id: &str, now: DateTime<Utc>) -> AppResult<Session> {
        {
            let inner = self.inner.read().await;
            match inner.sessions.get(id) {
                Some(session) if now < session.expires_at => return Ok(session.clone()),
                None => return Err(AppError::SessionNotFound),
                Some(_) => {} // expired, fall through to removal
            }
        }

        let mut inner = self.inner.write().await;
        inner.sessions.remove(id);
        Err(AppError::SessionNotFound)
    }

    /// Replace the token bundle after a refresh. The refresh token rotates
    /// only when the IdP sent a new one.
    pub async fn update_tokens(
        &self,
        id: &str,
        access_token: String,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> AppResult<Session> {
        let mut inner = self.inner.write().await;
        let session = inner
            .sessions
            .get_mut(id)
            .ok_or(AppError::SessionNotFound)?;
        session.access_token = access_token;
        if refresh_token.is_some() {
            session.refresh_token = refresh_token;
        }
        session.expires_at = expires_at;
        Ok(session.clone())
    }

    pub async fn remove(&self, id: &str) -> Option<Session> {
        let mut inner = self.inner.write().await;
        inner.sessions.remove(id)
    }

    /// Periodic sweep of expired sessions and stale login states.
    pub async fn cleanup_expired(&self, now: DateTime<Utc>) {
        let mut inner = self.inner.write().await;
        inner.sessions.retain(|_, session| now < session.expires_at);

        let stale: Vec<String> = inner
            .states
            .iter()
            .filter(|(_, created_at)| now - **created_at > Duration::seconds(STATE_TTL_SECS))
            .map(|(state, _)| state.clone())
            .collect();
        for state in stale {
            inner.states.remove(&state);
            inner.verifiers.remove(&state);
            inner.nonces.remove(&state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn session(expires_at: DateTime<Utc>) -> Session {
        Session {
            user_id: UserId::nil(),
            email: "a@example.com".into(),
            display_name: "A".into(),
            role: Role::General,
            access_token: "at".into(),
            refresh_token: Some("rt".into()),
            expires_at,
        }
    }

    #[tokio::test]
    async fn get_returns_live_session() {
        let store = SessionStore::new();
        let now = t("2025-06-01T10:00:00Z");
        store.insert("sid".into(), session(now + Duration::hours(1))).await;
        assert!(store.get("sid", now).await.is_ok());
    }

    #[tokio::test]
    async fn expired_session_is_removed_on_read() {
        let store = SessionStore::new();
        let now = t("2025-06-01T10:00:00Z");
        store.insert("sid".into(), session(now - Duration::seconds(1))).await;

        assert!(matches!(
            store.get("sid", now).await,
            Err(AppError::SessionNotFound)
        ));
        // Entry is gone, not just hidden.
        assert!(store.remove("sid").await.is_none());
    }

    #[tokio::test]
    async fn state_is_single_use() {
        let store = SessionStore::new();
        let now = t("2025-06-01T10:00:00Z");
        store.begin_login("st", "verifier", "nonce", now).await;

        let (verifier, nonce) = store.take_login("st", now).await.unwrap();
        assert_eq!(verifier, "verifier");
        assert_eq!(nonce, "nonce");

        assert!(matches!(
            store.take_login("st", now).await,
            Err(AppError::InvalidState)
        ));
    }

    #[tokio::test]
    async fn expired_state_is_rejected_and_consumed() {
        let store = SessionStore::new();
        let created = t("2025-06-01T10:00:00Z");
        store.begin_login("st", "verifier", "nonce", created).await;

        let later = created + Duration::minutes(11);
        assert!(matches!(
            store.take_login("st", later).await,
            Err(AppError::InvalidState)
        ));
        assert!(matches!(
            store.take_login("st", created).await,
            Err(AppError::InvalidState)
        ));
    }

    #[tokio::test]
    async fn refresh_rotates_token_only_when_new_one_arrives() {
        let store = SessionStore::new();
        let now = t("2025-06-01T10:00:00Z");
        store.insert("sid".into(), session(now + Duration::hours(1))).await;

        let updated = store
            .update_tokens("sid", "at2".into(), None, now + Duration::hours(2))
            .await
            .unwrap();
        assert_eq!(updated.refresh_token.as_deref(), Some("rt"));

        let updated = store
            .update_tokens("sid", "at3".into(), Some("rt2".into()), now + Duration::hours(3))
            .await
            .unwrap();
        assert_eq!(updated.refresh_token.as_deref(), Some("rt2"));
    }

    #[tokio::test]
    async fn cleanup_sweeps_sessions_and_states() {
        let store = SessionStore::new();
        let now = t("2025-06-01T10:00:00Z");
        store.insert("dead".into(), session(now - Duration::hours(1))).await;
        store.insert("live".into(), session(now + Duration::hours(1))).await;
        store.begin_login("old", "v", "n", now - Duration::hours(1)).await;

        store.cleanup_expired(now).await;

        assert!(store.get("live", now).await.is_ok());
        assert!(store.get("dead", now).await.is_err());
        assert!(store.take_login("old", now).await.is_err());
    }
}
