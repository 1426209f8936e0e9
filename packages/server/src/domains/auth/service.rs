//! The OIDC session core: login initiation, callback, refresh, logout.

use std::sync::Arc;

use chrono::Duration;
use tracing::info;
use url::Url;

use super::pkce;
use super::provider::OidcProvider;
use super::session::{Session, SessionId, SessionStore};
use super::token::TokenVerifier;
use crate::common::{AppError, AppResult, Clock, IdGen, UserId};
use crate::domains::audit::{ActorContext, AuditAction, AuditRecorder};
use crate::domains::users::{store::UpsertUser, UserStore};

/// Session lifetime when the IdP does not say otherwise.
const DEFAULT_SESSION_TTL_SECS: i64 = 3600;

/// Network context of the calling request, for audit entries.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

pub struct AuthService {
    provider: Arc<dyn OidcProvider>,
    sessions: Arc<SessionStore>,
    users: Arc<dyn UserStore>,
    audit: AuditRecorder,
    clock: Arc<dyn Clock>,
    id_gen: Arc<dyn IdGen>,
    verifier: TokenVerifier,
    client_id: String,
    redirect_url: String,
}

impl AuthService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: Arc<dyn OidcProvider>,
        sessions: Arc<SessionStore>,
        users: Arc<dyn UserStore>,
        audit: AuditRecorder,
        clock: Arc<dyn Clock>,
        id_gen: Arc<dyn IdGen>,
        issuer: impl Into<String>,
        client_id: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        let client_id = client_id.into();
        Self {
            provider,
            sessions,
            users,
            audit,
            clock,
            id_gen,
            verifier: TokenVerifier::new(issuer, client_id.clone()),
            client_id,
            redirect_url: redirect_url.into(),
        }
    }

    /// Build the authorisation URL and park state, verifier, and nonce
    /// until the callback. A caller-supplied `state` is honoured; otherwise
    /// one is generated.
    pub async fn begin_login(&self, state: Option<String>) -> AppResult<String> {
        let metadata = self.provider.metadata().await?;

        let state = state
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.id_gen.new_token());
        let pair = pkce::generate_pair();
        let nonce = self.id_gen.new_token();

        self.sessions
            .begin_login(&state, &pair.verifier, &nonce, self.clock.now())
            .await;

        let mut url = Url::parse(&metadata.authorization_endpoint)
            .map_err(|e| AppError::Oidc(format!("bad authorization endpoint: {e}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_url)
            .append_pair("scope", "openid profile email")
            .append_pair("state", &state)
            .append_pair("nonce", &nonce)
            .append_pair("code_challenge", &pair.challenge)
            .append_pair("code_challenge_method", "S256");

        Ok(url.into())
    }

    /// Complete the code exchange and mint a session. Returns the session
    /// together with its ID so the HTTP layer can set the real cookie
    /// value.
    pub async fn handle_callback(
        &self,
        code: &str,
        state: &str,
        client: &ClientInfo,
    ) -> AppResult<(Session, SessionId)> {
        let now = self.clock.now();
        let (code_verifier, nonce) = self.sessions.take_login(state, now).await?;

        let bundle = self.provider.exchange_code(code, &code_verifier).await?;
        let id_token = bundle
            .id_token
            .as_deref()
            .ok_or_else(|| AppError::Oidc("token response carried no id_token".into()))?;

        let jwks = self.provider.jwks().await?;
        let claims = self
            .verifier
            .verify(id_token, &bundle.access_token, &nonce, &jwks, now)?;

        let email = claims
            .email
            .ok_or_else(|| AppError::Oidc("ID token carried no email".into()))?;
        let display_name = claims.name.unwrap_or_else(|| email.clone());

        let user = self
            .users
            .upsert_by_email(UpsertUser {
                id: UserId::from_uuid(self.id_gen.new_uuid()),
                subject: &claims.sub,
                email: &email,
                display_name: &display_name,
                now,
            })
            .await?;

        let session_id = self.id_gen.new_token();
        let ttl = bundle.expires_in.unwrap_or(DEFAULT_SESSION_TTL_SECS);
        let session = Session {
            user_id: user.id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            role: user.role,
            access_token: bundle.access_token,
            refresh_token: bundle.refresh_token,
            expires_at: now + Duration::seconds(ttl),
        };
        self.sessions.insert(session_id.clone(), session.clone()).await;

        info!(user_id = %user.id, "login completed");
        self.audit
            .record(
                &ActorContext {
                    user_id: user.id,
                    ip_address: client.ip_address.clone(),
                    user_agent: client.user_agent.clone(),
                },
                AuditAction::Login,
                "user",
                &user.id.to_string(),
                serde_json::json!({"email": user.email}),
            )
            .await;

        Ok((session, session_id))
    }

    /// Live-session lookup; expired sessions report not-found.
    pub async fn get_session(&self, id: &str) -> AppResult<Session> {
        self.sessions.get(id, self.clock.now()).await
    }

    /// Run the refresh grant and extend the session. The stored refresh
    /// token rotates when the IdP returns a new one.
    pub async fn refresh_session(&self, id: &str) -> AppResult<Session> {
        let now = self.clock.now();
        let session = self.sessions.get(id, now).await?;
        let refresh_token = session
            .refresh_token
            .as_deref()
            .ok_or_else(|| AppError::Oidc("session has no refresh token".into()))?;

        let bundle = self.provider.refresh(refresh_token).await?;
        let ttl = bundle.expires_in.unwrap_or(DEFAULT_SESSION_TTL_SECS);
        self.sessions
            .update_tokens(
                id,
                bundle.access_token,
                bundle.refresh_token,
                now + Duration::seconds(ttl),
            )
            .await
    }

    /// Remove the session and record the LOGOUT.
    pub async fn logout(&self, id: &str, client: &ClientInfo) -> AppResult<()> {
        let session = self.sessions.get(id, self.clock.now()).await?;
        self.sessions.remove(id).await;

        info!(user_id = %session.user_id, "logout");
        self.audit
            .record(
                &ActorContext {
                    user_id: session.user_id,
                    ip_address: client.ip_address.clone(),
                    user_agent: client.user_agent.clone(),
                },
                AuditAction::Logout,
                "user",
                &session.user_id.to_string(),
                serde_json::json!({"email": session.email}),
            )
            .await;
        Ok(())
    }

    /// Periodic sweep hook for the composition root.
    pub async fn cleanup_expired(&self) {
        self.sessions.cleanup_expired(self.clock.now()).await;
    }
}
