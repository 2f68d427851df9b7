//! HMAC signature verification for inbound provider webhooks.
//!
//! The provider signs each delivery with HMAC-SHA256 over the raw request
//! body using the shared webhook secret. Verification runs before the body
//! is parsed, so a forged payload never reaches normalization or storage.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signature verification errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// Signature header absent or empty while a secret is configured.
    MissingSignature,
    /// Signature header present but not in a recognized format.
    InvalidFormat(String),
    /// Signature did not match the expected HMAC.
    Mismatch,
    /// Secret key rejected by the MAC implementation.
    InvalidSecret,
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSignature => write!(f, "signature header missing"),
            Self::InvalidFormat(format) => write!(f, "invalid signature format: {format}"),
            Self::Mismatch => write!(f, "signature mismatch"),
            Self::InvalidSecret => write!(f, "invalid secret key"),
        }
    }
}

impl std::error::Error for SignatureError {}

/// Verifies a webhook signature against the raw request body.
///
/// Accepted header formats: `sha256=<hex>` (GitHub style), `v1=<hex>`
/// (Stripe style), or 64 chars of raw hex. Comparison is timing-safe.
///
/// # Errors
///
/// Returns a [`SignatureError`] describing why verification failed.
pub fn verify_signature(payload: &[u8], signature: &str, secret: &str) -> Result<(), SignatureError> {
    if signature.is_empty() {
        return Err(SignatureError::MissingSignature);
    }

    let provided_hex = parse_signature_format(signature)?;
    let expected_hex = hmac_hex(payload, secret)?;

    if timing_safe_eq(&provided_hex, &expected_hex) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Computes the HMAC-SHA256 of the payload as a lowercase hex string.
///
/// # Errors
///
/// Returns `SignatureError::InvalidSecret` if the secret key is rejected.
pub fn hmac_hex(payload: &[u8], secret: &str) -> Result<String, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidSecret)?;

    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Extracts the hex digest from the supported header formats.
fn parse_signature_format(signature: &str) -> Result<String, SignatureError> {
    if let Some(hex) = signature.strip_prefix("sha256=") {
        return Ok(hex.to_string());
    }

    if let Some(hex) = signature.strip_prefix("v1=") {
        return Ok(hex.to_string());
    }

    if signature.len() == 64 && signature.chars().all(|c| c.is_ascii_hexdigit()) {
        return Ok(signature.to_string());
    }

    Err(SignatureError::InvalidFormat(format!(
        "expected 'sha256=<hex>', 'v1=<hex>', or raw hex, got: {signature}",
    )))
}

/// Timing-safe comparison to avoid leaking the expected digest.
fn timing_safe_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
