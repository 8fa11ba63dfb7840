//! RSA-SHA256 webhook signature verification.
//!
//! The signing provider sends a standard base64 PKCS#1 v1.5 signature over
//! the raw request body in the `X-Signature` header.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use jsonwebtoken::{crypto, Algorithm, DecodingKey};
use thiserror::Error;

/// Reasons a signed callback is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("Invalid public key: {0}")]
    InvalidKey(String),

    #[error("Missing signature")]
    Missing,

    #[error("Malformed signature")]
    Malformed,

    #[error("Signature mismatch")]
    Mismatch,
}

/// Verifies callbacks against a provider public key loaded once at startup.
#[derive(Clone)]
pub struct RsaSignatureVerifier {
    key: DecodingKey,
}

impl std::fmt::Debug for RsaSignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaSignatureVerifier").finish_non_exhaustive()
    }
}

impl RsaSignatureVerifier {
    /// Loads a PEM public key (`PUBLIC KEY` or `RSA PUBLIC KEY`).
    pub fn from_pem(public_key_pem: &str) -> Result<Self, SignatureError> {
        let key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
        Ok(Self { key })
    }

    /// Checks `signature` (standard base64) against the raw body.
    pub fn check(&self, raw_body: &[u8], signature: Option<&str>) -> Result<(), SignatureError> {
        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(SignatureError::Missing)?;

        let bytes = STANDARD
            .decode(signature)
            .map_err(|_| SignatureError::Malformed)?;

        // jsonwebtoken expects the JWS (url-safe, unpadded) encoding.
        let jws_signature = URL_SAFE_NO_PAD.encode(bytes);

        match crypto::verify(&jws_signature, raw_body, &self.key, Algorithm::RS256) {
            Ok(true) => Ok(()),
            Ok(false) => Err(SignatureError::Mismatch),
            Err(_) => Err(SignatureError::Malformed),
        }
    }

    pub fn verify(&self, raw_body: &[u8], signature: &str) -> bool {
        self.check(raw_body, Some(signature)).is_ok()
    }
}

/// One-shot verification. Any failure, including a bad key, yields `false`.
pub fn verify_signature(raw_body: &[u8], signature: &str, public_key_pem: &str) -> bool {
    RsaSignatureVerifier::from_pem(public_key_pem)
        .map(|verifier| verifier.verify(raw_body, signature))
        .unwrap_or(false)
}
