use serde_json::Value;

use crate::services::auth::jwk::{KeyMaterialError, PublicKeyMaterial};
use crate::services::auth::jws::JsonObject;
use crate::services::auth::replay::LedgerError;

/// Claims of a verified proof, plus typed access to the issuance hints.
#[derive(Debug, Clone)]
pub struct ProofClaims(JsonObject);

impl ProofClaims {
    pub fn new(claims: JsonObject) -> Self {
        Self(claims)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Requested lifetime in seconds. `None` when absent or undecodable.
    pub fn token_lifetime(&self) -> Option<i64> {
        self.get("token_lifetime")
            .and_then(|v| decode_integer(v).ok())
    }

    /// Space-delimited allow-list of identity claim names.
    pub fn token_claims(&self) -> Option<&str> {
        self.get("token_claims").and_then(Value::as_str)
    }

    pub fn token_nonce(&self) -> Option<&str> {
        self.get("token_nonce").and_then(Value::as_str)
    }
}

/// Result of a successful proof verification.
#[derive(Debug, Clone)]
pub struct VerifiedProof {
    pub key: PublicKeyMaterial,
    pub claims: ProofClaims,
    pub jti: String,
}

/// Settings the verifier needs; kept apart from `Config` so tests can build them directly.
#[derive(Debug, Clone)]
pub struct ProofPolicy {
    // The issued token's `iss`; proofs must name it in `aud`.
    pub issuer: String,
    // Allowed clock skew for exp/nbf/iat, seconds.
    pub leeway_seconds: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum ProofError {
    #[error("malformed proof token: {0}")]
    Malformed(String),
    #[error("missing jwk in proof header")]
    MissingKeyMaterial,
    #[error(transparent)]
    KeyMaterial(#[from] KeyMaterialError),
    #[error("proof signature verification failed")]
    InvalidSignature,
    #[error("missing required claim: {0}")]
    MissingClaim(&'static str),
    #[error("invalid claim '{0}': {1}")]
    InvalidClaim(&'static str, ClaimDecodeError),
    #[error("subject missing from identity claims")]
    IdentitySubjectMissing,
    #[error("proof subject does not match identity subject")]
    SubjectMismatch,
    #[error("proof audience does not contain the issuer")]
    InvalidAudience,
    #[error("proof expired or not yet valid")]
    TokenExpiredOrNotYetValid,
    #[error("proof token already used")]
    ReplayDetected,
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimDecodeError {
    #[error("number out of range")]
    OutOfRange,
    #[error("not an integer string")]
    InvalidString,
    #[error("unexpected json type")]
    UnexpectedType,
}

/// Decode a numeric claim. Tried in order: JSON integer, finite JSON float
/// (truncated toward zero), decimal integer string.
pub fn decode_integer(value: &Value) -> Result<i64, ClaimDecodeError> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            if n.is_u64() {
                return Err(ClaimDecodeError::OutOfRange);
            }
            match n.as_f64() {
                Some(f) if f.is_finite() => {
                    let t = f.trunc();
                    if t >= i64::MIN as f64 && t < i64::MAX as f64 {
                        Ok(t as i64)
                    } else {
                        Err(ClaimDecodeError::OutOfRange)
                    }
                }
                _ => Err(ClaimDecodeError::OutOfRange),
            }
        }
        Value::String(s) => s
            .parse::<i64>()
            .map_err(|_| ClaimDecodeError::InvalidString),
        _ => Err(ClaimDecodeError::UnexpectedType),
    }
}
