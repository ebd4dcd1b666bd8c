//! HMAC-SHA256 signing for violations
//!
//! Verification runs in constant time via `subtle` so an attacker probing
//! the violation store cannot learn anything from response timing.

use crate::error::{EngineError, Result};
use crate::violation::Violation;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Minimum byte length accepted for a signing secret; weak or placeholder
/// secrets are rejected at startup.
pub const MIN_SECRET_LEN: usize = 32;

const KNOWN_WEAK_SECRETS: &[&str] = &["changeme", "secret", "password", "test", ""];

pub struct SigningService {
    secret: Vec<u8>,
}

impl SigningService {
    /// Builds a signing service, rejecting secrets shorter than
    /// [`MIN_SECRET_LEN`] bytes or matching a known-weak placeholder.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
        let secret = secret.as_ref().to_vec();
        if secret.len() < MIN_SECRET_LEN {
            return Err(EngineError::Validation(format!(
                "signing secret is {} bytes, minimum is {MIN_SECRET_LEN}",
                secret.len()
            )));
        }
        if let Ok(text) = std::str::from_utf8(&secret) {
            let lowered = text.to_ascii_lowercase();
            if KNOWN_WEAK_SECRETS.contains(&lowered.as_str()) {
                return Err(EngineError::Validation(
                    "signing secret matches a known-weak placeholder value".into(),
                ));
            }
        }
        Ok(Self { secret })
    }

    pub fn sign(&self, violation: &Violation) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts keys of any length");
        mac.update(&violation.canonical_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time signature verification.
    pub fn verify(&self, violation: &Violation) -> bool {
        let expected = self.sign(violation);
        let expected_bytes = expected.as_bytes();
        let actual_bytes = violation.signature.as_bytes();
        if expected_bytes.len() != actual_bytes.len() {
            return false;
        }
        expected_bytes.ct_eq(actual_bytes).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn make_violation(message: &str) -> Violation {
        Violation {
            id: "v1".to_string(),
            tenant_id: "tenant-a".to_string(),
            rule_id: "r1".to_string(),
            rule_name: "error-status".to_string(),
            severity: crate::rule::Severity::High,
            message: message.to_string(),
            trace_ids: BTreeSet::from(["t1".to_string()]),
            span_refs: vec![crate::violation::SpanRef {
                trace_id: "t1".to_string(),
                span_id: "s1".to_string(),
                service_name: "svc".to_string(),
            }],
            created_at: chrono::Utc::now(),
            signature: String::new(),
            metadata: BTreeMap::new(),
        }
    }

    fn service() -> SigningService {
        SigningService::new("0123456789abcdef0123456789abcdef").unwrap()
    }

    #[test]
    fn rejects_short_secret() {
        assert!(SigningService::new("short").is_err());
    }

    #[test]
    fn rejects_known_weak_secret() {
        assert!(SigningService::new("changeme").is_err());
        assert!(SigningService::new("password").is_err());
    }

    #[test]
    fn sign_then_verify_succeeds() {
        let svc = service();
        let mut v = make_violation("hello");
        v.signature = svc.sign(&v);
        assert!(svc.verify(&v));
    }

    #[test]
    fn tampered_message_fails_verification() {
        let svc = service();
        let mut v = make_violation("hello");
        v.signature = svc.sign(&v);
        v.message = "tampered".to_string();
        assert!(!svc.verify(&v));
    }

    #[test]
    fn different_secrets_produce_different_signatures() {
        let svc_a = SigningService::new("0123456789abcdef0123456789abcdef").unwrap();
        let svc_b = SigningService::new("fedcba9876543210fedcba9876543210").unwrap();
        let v = make_violation("hello");
        assert_ne!(svc_a.sign(&v), svc_b.sign(&v));
    }
}
