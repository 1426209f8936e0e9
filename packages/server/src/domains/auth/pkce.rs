//! PKCE (RFC 7636) challenge material.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of generated code verifiers. RFC 7636 requires 43..=128
/// characters; 64 alphanumerics comfortably exceed the minimum entropy.
const VERIFIER_LEN: usize = 64;

#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

/// Generate a fresh verifier and its S256 challenge.
pub fn generate_pair() -> PkcePair {
    let verifier = generate_verifier();
    let challenge = challenge_s256(&verifier);
    PkcePair { verifier, challenge }
}

pub fn generate_verifier() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(VERIFIER_LEN)
        .map(char::from)
        .collect()
}

/// `base64url(SHA-256(verifier))`, unpadded.
pub fn challenge_s256(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
