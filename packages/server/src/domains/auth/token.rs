//! ID-token verification.
//!
//! Verifies signature (against the issuer's JWKS), `iss`, `aud`, `exp` and
//! `iat` under clock skew, the login `nonce`, and - when present - the
//! `at_hash` binding to the access token.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::common::{AppError, AppResult};

/// Tolerated clock delta between issuer and verifier.
const CLOCK_SKEW_SECS: i64 = 60;

/// The `aud` claim: providers send either a bare string or an array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, client_id: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == client_id,
            Audience::Many(auds) => auds.iter().any(|aud| aud == client_id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: Audience,
    pub exp: i64,
    pub iat: i64,
    pub email: Option<String>,
    pub name: Option<String>,
    pub nonce: Option<String>,
    pub at_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TokenVerifier {
    issuer: String,
    client_id: String,
    clock_skew: Duration,
}

impl TokenVerifier {
    pub fn new(issuer: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            client_id: client_id.into(),
            clock_skew: Duration::seconds(CLOCK_SKEW_SECS),
        }
    }

    /// Full verification path: resolve the signing key from the JWKS by
    /// `kid`, then check signature and claims.
    pub fn verify(
        &self,
        id_token: &str,
        access_token: &str,
        expected_nonce: &str,
        keys: &JwkSet,
        now: DateTime<Utc>,
    ) -> AppResult<IdTokenClaims> {
        let header =
            decode_header(id_token).map_err(|e| AppError::Oidc(format!("bad token header: {e}")))?;

        let jwk = match &header.kid {
            Some(kid) => keys.find(kid),
            None => keys.keys.first(),
        }
        .ok_or_else(|| AppError::Oidc("no matching key in JWKS".into()))?;

        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| AppError::Oidc(format!("unusable JWK: {e}")))?;

        self.verify_with_key(id_token, &key, header.alg, access_token, expected_nonce, now)
    }

    /// Signature + claims against an explicit key. Tests drive this with an
    /// HS256 secret instead of a JWKS.
    pub fn verify_with_key(
        &self,
        id_token: &str,
        key: &DecodingKey,
        algorithm: Algorithm,
        access_token: &str,
        expected_nonce: &str,
        now: DateTime<Utc>,
    ) -> AppResult<IdTokenClaims> {
        // Claim checks are done manually below so clock skew and the error
        // taxonomy stay under our control.
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<IdTokenClaims>(id_token, key, &validation)
            .map_err(|e| AppError::Oidc(format!("signature verification failed: {e}")))?;

        self.check_claims(&data.claims, access_token, expected_nonce, now)?;
        Ok(data.claims)
    }

    fn check_claims(
        &self,
        claims: &IdTokenClaims,
        access_token: &str,
        expected_nonce: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if claims.iss != self.issuer {
            return Err(AppError::InvalidIssuer);
        }
        if !claims.aud.contains(&self.client_id) {
            return Err(AppError::InvalidAudience);
        }

        let now_secs = now.timestamp();
        let skew = self.clock_skew.num_seconds();
        if claims.exp <= now_secs - skew {
            return Err(AppError::TokenExpired);
        }
        if claims.iat >= now_secs + skew {
            return Err(AppError::FutureIssuedAt);
        }

        match &claims.nonce {
            Some(nonce) if nonce == expected_nonce => {}
            _ => return Err(AppError::InvalidNonce),
        }

        if let Some(at_hash) = &claims.at_hash {
            if *at_hash != compute_at_hash(access_token) {
                return Err(AppError::InvalidAtHash);
            }
        }

        Ok(())
    }
}

/// `base64url(leftmost half of SHA-256(access_token))`.
pub fn compute_at_hash(access_token: &str) -> String {
    let digest = Sha256::digest(access_token.as_bytes());
    URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &[u8] = b"test-secret";
    const ISSUER: &str = "https://idp.example.com";
    const CLIENT_ID: &str = "scheduler";

    fn t(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn claims(now: DateTime<Utc>) -> IdTokenClaims {
        IdTokenClaims {
            iss: ISSUER.into(),
            sub: "subject-1".into(),
            aud: Audience::Single(CLIENT_ID.into()),
            exp: (now + Duration::hours(1)).timestamp(),
            iat: now.timestamp(),
            email: Some("user@example.com".into()),
            name: Some("User".into()),
            nonce: Some("nonce-1".into()),
            at_hash: None,
        }
    }

    fn sign(claims: &IdTokenClaims) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    fn verify(token: &str, access_token: &str, nonce: &str, now: DateTime<Utc>) -> AppResult<IdTokenClaims> {
        TokenVerifier::new(ISSUER, CLIENT_ID).verify_with_key(
            token,
            &DecodingKey::from_secret(SECRET),
            Algorithm::HS256,
            access_token,
            nonce,
            now,
        )
    }

    #[test]
    fn valid_token_passes() {
        let now = t("2025-06-01T10:00:00Z");
        let token = sign(&claims(now));
        let verified = verify(&token, "access", "nonce-1", now).unwrap();
        assert_eq!(verified.sub, "subject-1");
    }

    #[test]
    fn audience_accepts_array_form() {
        let now = t("2025-06-01T10:00:00Z");
        let mut c = claims(now);
        c.aud = Audience::Many(vec!["other".into(), CLIENT_ID.into()]);
        assert!(verify(&sign(&c), "access", "nonce-1", now).is_ok());

        c.aud = Audience::Many(vec!["other".into()]);
        assert!(matches!(
            verify(&sign(&c), "access", "nonce-1", now),
            Err(AppError::InvalidAudience)
        ));
    }

    #[test]
    fn audience_claim_deserialises_from_string_or_array() {
        let single: Audience = serde_json::from_str("\"scheduler\"").unwrap();
        assert!(single.contains("scheduler"));
        let many: Audience = serde_json::from_str("[\"a\", \"scheduler\"]").unwrap();
        assert!(many.contains("scheduler"));
    }

    #[test]
    fn wrong_issuer_fails() {
        let now = t("2025-06-01T10:00:00Z");
        let mut c = claims(now);
        c.iss = "https://evil.example.com".into();
        assert!(matches!(
            verify(&sign(&c), "access", "nonce-1", now),
            Err(AppError::InvalidIssuer)
        ));
    }

    #[test]
    fn expiry_honours_clock_skew() {
        let now = t("2025-06-01T10:00:00Z");
        let mut c = claims(now);

        // 30 s past expiry is inside the 60 s skew.
        c.exp = (now - Duration::seconds(30)).timestamp();
        assert!(verify(&sign(&c), "access", "nonce-1", now).is_ok());

        // 90 s past expiry is out.
        c.exp = (now - Duration::seconds(90)).timestamp();
        assert!(matches!(
            verify(&sign(&c), "access", "nonce-1", now),
            Err(AppError::TokenExpired)
        ));
    }

    #[test]
    fn future_iat_honours_clock_skew() {
        let now = t("2025-06-01T10:00:00Z");
        let mut c = claims(now);

        c.iat = (now + Duration::seconds(30)).timestamp();
        assert!(verify(&sign(&c), "access", "nonce-1", now).is_ok());

        c.iat = (now + Duration::seconds(90)).timestamp();
        assert!(matches!(
            verify(&sign(&c), "access", "nonce-1", now),
            Err(AppError::FutureIssuedAt)
        ));
    }

    #[test]
    fn nonce_mismatch_fails() {
        let now = t("2025-06-01T10:00:00Z");
        let token = sign(&claims(now));
        assert!(matches!(
            verify(&token, "access", "other-nonce", now),
            Err(AppError::InvalidNonce)
        ));

        let mut c = claims(now);
        c.nonce = None;
        assert!(matches!(
            verify(&sign(&c), "access", "nonce-1", now),
            Err(AppError::InvalidNonce)
        ));
    }

    #[test]
    fn at_hash_is_checked_when_present() {
        let now = t("2025-06-01T10:00:00Z");
        let access_token = "the-access-token";

        let mut c = claims(now);
        c.at_hash = Some(compute_at_hash(access_token));
        assert!(verify(&sign(&c), access_token, "nonce-1", now).is_ok());

        assert!(matches!(
            verify(&sign(&c), "a-different-token", "nonce-1", now),
            Err(AppError::InvalidAtHash)
        ));
    }

    #[test]
    fn missing_at_hash_is_accepted() {
        let now = t("2025-06-01T10:00:00Z");
        let token = sign(&claims(now));
        assert!(verify(&token, "anything", "nonce-1", now).is_ok());
    }

    #[test]
    fn tampered_signature_fails() {
        let now = t("2025-06-01T10:00:00Z");
        let token = sign(&claims(now));
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[2] = "AAAA";
        let forged = parts.join(".");
        assert!(verify(&forged, "access", "nonce-1", now).is_err());
    }
}
