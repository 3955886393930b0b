//! PKCE verifier/challenge and CSRF nonce generation.

use base64::prelude::*;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of a PKCE code verifier.
pub const CODE_VERIFIER_LEN: usize = 128;

/// Length of a CSRF nonce.
pub const NONCE_LEN: usize = 64;

const UNRESERVED: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";
const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

fn random_string(charset: &[u8], len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(charset[rng.random_range(0..charset.len())]))
        .collect()
}

/// Generate a PKCE code verifier of [`CODE_VERIFIER_LEN`] unreserved characters.
#[must_use]
pub fn generate_code_verifier() -> String {
    random_string(UNRESERVED, CODE_VERIFIER_LEN)
}

/// Generate a CSRF nonce of [`NONCE_LEN`] alphanumeric characters.
#[must_use]
pub fn generate_nonce() -> String {
    random_string(ALPHANUMERIC, NONCE_LEN)
}

/// Derive the S256 code challenge for a verifier.
#[must_use]
pub fn code_challenge(verifier: &str) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// A verifier together with its derived challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkcePair {
    /// Secret kept by the client until the code exchange.
    pub verifier: String,
    /// Public value sent with the authorize request.
    pub challenge: String,
}

impl PkcePair {
    /// Generate a fresh pair.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_verifier(generate_code_verifier())
    }

    /// Derive the pair for an existing verifier.
    #[must_use]
    pub fn from_verifier(verifier: String) -> Self {
        let challenge = code_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_shape() {
        let verifier = generate_code_verifier();
        assert_eq!(verifier.len(), CODE_VERIFIER_LEN);
        assert!(verifier.bytes().all(|b| UNRESERVED.contains(&b)));
    }

    #[test]
    fn nonce_shape() {
        let nonce = generate_nonce();
        assert_eq!(nonce.len(), NONCE_LEN);
        assert!(nonce.bytes().all(|b| b.is_ascii_alphanumeric()));
        assert_ne!(nonce, generate_nonce());
    }

    #[test]
    fn rfc7636_challenge_vector() {
        assert_eq!(
            code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn pair_is_consistent() {
        let pair = PkcePair::generate();
        assert_eq!(pair.challenge, code_challenge(&pair.verifier));
    }
}
