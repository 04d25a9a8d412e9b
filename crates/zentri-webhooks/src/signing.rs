//! Event envelope serialization and HMAC-SHA256 payload signing.
//!
//! The executor must send the returned bytes exactly as signed; receivers
//! verify the signature over the raw request body with their copy of the
//! shared secret.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::error::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// The JSON envelope posted to subscriber endpoints.
///
/// Field order is not part of the contract; receivers must parse the body
/// as JSON rather than treating it as a byte-exact canonical form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: String,
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

/// A serialized envelope together with its hex-encoded signature.
#[derive(Debug, Clone)]
pub struct SignedPayload {
    pub body: Vec<u8>,
    pub signature: String,
}

/// Serialize an envelope and sign the exact bytes with the subscriber's
/// shared secret.
///
/// # Errors
///
/// An empty secret is a subscriber configuration error; it fails this
/// delivery attempt, never the surrounding batch.
pub fn sign_envelope(
    secret: &str,
    envelope: &EventEnvelope,
) -> Result<SignedPayload, WebhookError> {
    if secret.is_empty() {
        return Err(WebhookError::MissingSecret);
    }
    let body = serde_json::to_vec(envelope)?;
    let signature = compute_signature(secret, &body);
    Ok(SignedPayload { body, signature })
}

/// Compute the hex-encoded HMAC-SHA256 of `body` under `secret`.
pub fn compute_signature(secret: &str, body: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a hex signature against a body using constant-time comparison.
///
/// Provided for receiver implementations and diagnostics.
#[must_use]
pub fn verify_signature(expected_hex: &str, secret: &str, body: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    let computed = compute_signature(secret, body);
    expected_hex.as_bytes().ct_eq(computed.as_bytes()).into()
}
