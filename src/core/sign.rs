//! Replay Signing
//!
//! A finished battle's turn history is signed with HMAC-SHA256 under a
//! server-held secret. The payload is canonical JSON: struct field order is
//! fixed by the type definitions and all embedded maps are `BTreeMap`, so
//! serialization is byte-stable. Verification recomputes the tag and
//! compares in constant time; any mismatch means the stored history was
//! tampered with and the replay is refused.

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Errors from signing a payload.
#[derive(Debug, Error)]
pub enum SignError {
    /// The payload could not be serialized to canonical JSON.
    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Signs and verifies replay payloads with a server-held secret.
#[derive(Clone)]
pub struct ReplaySigner {
    secret: Vec<u8>,
}

impl ReplaySigner {
    /// Create a signer from the server secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Sign a payload, returning the hex-encoded HMAC-SHA256 tag.
    pub fn sign<T: Serialize>(&self, payload: &T) -> Result<String, SignError> {
        let canonical = serde_json::to_vec(payload)?;
        let mut mac = self.mac();
        mac.update(&canonical);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Verify a payload against a hex-encoded signature.
    ///
    /// Returns false for malformed hex as well as for a wrong tag; the
    /// comparison of a well-formed tag is constant time.
    pub fn verify<T: Serialize>(&self, payload: &T, signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        let Ok(canonical) = serde_json::to_vec(payload) else {
            return false;
        };
        let mut mac = self.mac();
        mac.update(&canonical);
        mac.verify_slice(&expected).is_ok()
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length
        HmacSha256::new_from_slice(&self.secret).expect("HMAC key of any size is valid")
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Payload {
        battle_id: u64,
        turns: Vec<String>,
    }

    fn payload() -> Payload {
        Payload {
            battle_id: 7,
            turns: vec!["a:attack".into(), "b:defend".into()],
        }
    }

    #[test]
    fn sign_then_verify() {
        let signer = ReplaySigner::new(b"test-secret".to_vec());
        let sig = signer.sign(&payload()).unwrap();

        assert!(signer.verify(&payload(), &sig));
    }

    #[test]
    fn tampered_payload_fails() {
        let signer = ReplaySigner::new(b"test-secret".to_vec());
        let sig = signer.sign(&payload()).unwrap();

        let tampered = Payload {
            battle_id: 8,
            turns: vec!["a:attack".into(), "b:defend".into()],
        };
        assert!(!signer.verify(&tampered, &sig));
    }

    #[test]
    fn tampered_signature_fails() {
        let signer = ReplaySigner::new(b"test-secret".to_vec());
        let sig = signer.sign(&payload()).unwrap();

        // Flip one nibble of the hex tag
        let mut bytes: Vec<u8> = sig.into_bytes();
        bytes[0] = if bytes[0] == b'0' { b'1' } else { b'0' };
        let flipped = String::from_utf8(bytes).unwrap();

        assert!(!signer.verify(&payload(), &flipped));
    }

    #[test]
    fn malformed_hex_fails() {
        let signer = ReplaySigner::new(b"test-secret".to_vec());
        assert!(!signer.verify(&payload(), "not hex at all"));
        assert!(!signer.verify(&payload(), ""));
    }

    #[test]
    fn different_secret_fails() {
        let signer = ReplaySigner::new(b"secret-a".to_vec());
        let other = ReplaySigner::new(b"secret-b".to_vec());
        let sig = signer.sign(&payload()).unwrap();

        assert!(!other.verify(&payload(), &sig));
    }
}
