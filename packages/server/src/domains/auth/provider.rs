//! Identity-provider HTTP plumbing.
//!
//! Discovery, JWKS fetch (with a TTL cache), the authorization-code
//! exchange, and the refresh grant all live behind [`OidcProvider`] so the
//! session core can be exercised against a fake IdP.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use serde::Deserialize;
use tokio::sync::{OnceCell, RwLock};
use tracing::debug;

use crate::common::{AppError, AppResult};
use crate::config::OidcConfig;

const JWKS_TTL: Duration = Duration::from_secs(300);

/// The subset of `/.well-known/openid-configuration` the service uses.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
}

/// A token-endpoint response (code exchange or refresh grant).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenBundle {
    pub access_token: String,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

#[async_trait]
pub trait OidcProvider: Send + Sync {
    async fn metadata(&self) -> AppResult<ProviderMetadata>;

    async fn jwks(&self) -> AppResult<JwkSet>;

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> AppResult<TokenBundle>;

    async fn refresh(&self, refresh_token: &str) -> AppResult<TokenBundle>;
}

#[derive(Clone)]
struct CachedJwks {
    set: Arc<JwkSet>,
    fetched_at: Instant,
}

impl CachedJwks {
    fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < JWKS_TTL
    }
}

/// Real IdP client over reqwest.
pub struct HttpOidcProvider {
    http: reqwest::Client,
    config: OidcConfig,
    metadata: OnceCell<ProviderMetadata>,
    jwks: RwLock<Option<CachedJwks>>,
}

impl HttpOidcProvider {
    pub fn new(config: OidcConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            metadata: OnceCell::new(),
            jwks: RwLock::new(None),
        }
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> AppResult<TokenBundle> {
        let metadata = self.metadata().await?;
        let response = self
            .http
            .post(&metadata.token_endpoint)
            .form(params)
            .send()
            .await
            .map_err(|e| AppError::Oidc(format!("token endpoint unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Oidc(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }
        response
            .json::<TokenBundle>()
            .await
            .map_err(|e| AppError::Oidc(format!("malformed token response: {e}")))
    }
}

#[async_trait]
impl OidcProvider for HttpOidcProvider {
    async fn metadata(&self) -> AppResult<ProviderMetadata> {
        self.metadata
            .get_or_try_init(|| async {
                let url = format!(
                    "{}/.well-known/openid-configuration",
                    self.config.issuer.trim_end_matches('/')
                );
                debug!(%url, "fetching OIDC discovery document");
                let response = self
                    .http
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| AppError::Oidc(format!("discovery failed: {e}")))?;
                response
                    .json::<ProviderMetadata>()
                    .await
                    .map_err(|e| AppError::Oidc(format!("malformed discovery document: {e}")))
            })
            .await
            .cloned()
    }

    async fn jwks(&self) -> AppResult<JwkSet> {
        {
            let cached = self.jwks.read().await;
            if let Some(cached) = cached.as_ref() {
                if cached.is_fresh() {
                    return Ok((*cached.set).clone());
                }
            }
        }

        let metadata = self.metadata().await?;
        debug!(url = %metadata.jwks_uri, "refreshing JWKS");
        let set = self
            .http
            .get(&metadata.jwks_uri)
            .send()
            .await
            .map_err(|e| AppError::Oidc(format!("JWKS fetch failed: {e}")))?
            .json::<JwkSet>()
            .await
            .map_err(|e| AppError::Oidc(format!("malformed JWKS: {e}")))?;

        let mut cached = self.jwks.write().await;
        *cached = Some(CachedJwks {
            set: Arc::new(set.clone()),
            fetched_at: Instant::now(),
        });
        Ok(set)
    }

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> AppResult<TokenBundle> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.config.redirect_url),
            ("client_id", &self.config.client_id),
            ("client_secret", &self.config.client_secret),
            ("code_verifier", code_verifier),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> AppResult<TokenBundle> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.config.client_id),
            ("client_secret", &self.config.client_secret),
        ])
        .await
    }
}
