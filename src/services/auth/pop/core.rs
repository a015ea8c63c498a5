//! Proof-of-possession verification.
//!
//! The proof is a compact JWS signed by the client with the key it embeds in its
//! own header (`jwk`). Verification order matters: the nonce ledger is consulted
//! last so a proof that fails any other check never burns its `jti`.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::services::auth::identity::IdentityClaims;
use crate::services::auth::jwk::PublicKeyMaterial;
use crate::services::auth::jws::{CompactJws, JsonObject, JwsError};
use crate::services::auth::replay::{ClaimOutcome, NonceLedger};

use super::types::{ProofClaims, ProofError, ProofPolicy, VerifiedProof, decode_integer};

#[derive(Clone)]
pub struct ProofVerifier {
    policy: ProofPolicy,
    ledger: Arc<dyn NonceLedger>,
}

impl std::fmt::Debug for ProofVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofVerifier")
            .field("policy", &self.policy)
            .finish()
    }
}

impl ProofVerifier {
    pub fn new(policy: ProofPolicy, ledger: Arc<dyn NonceLedger>) -> Self {
        Self { policy, ledger }
    }

    /// Verify `token` against `identity` at unix time `now`.
    pub async fn verify(
        &self,
        token: &str,
        identity: &IdentityClaims,
        now: i64,
    ) -> Result<VerifiedProof, ProofError> {
        let jws = CompactJws::parse(token).map_err(malformed)?;

        // 1) Key material from the proof's own header.
        let header = jws.header().map_err(malformed)?;
        let alg = header
            .get("alg")
            .and_then(Value::as_str)
            .ok_or_else(|| ProofError::Malformed("missing alg".into()))?;
        let jwk = match header.get("jwk") {
            None => return Err(ProofError::MissingKeyMaterial),
            Some(Value::Object(jwk)) => jwk,
            Some(_) => return Err(ProofError::Malformed("jwk is not an object".into())),
        };
        let key = PublicKeyMaterial::resolve_named(alg, jwk)?;

        // 2) Signature.
        let claims = jws.verify(&key).map_err(|e| match e {
            JwsError::InvalidSignature => ProofError::InvalidSignature,
            other => malformed(other),
        })?;

        // 3) Subject binding.
        let expected_sub = identity
            .subject()
            .ok_or(ProofError::IdentitySubjectMissing)?;
        let sub = claims
            .get("sub")
            .and_then(Value::as_str)
            .ok_or(ProofError::MissingClaim("sub"))?;
        if sub != expected_sub {
            return Err(ProofError::SubjectMismatch);
        }

        // 4) Audience.
        if !audience_contains(claims.get("aud"), &self.policy.issuer) {
            return Err(ProofError::InvalidAudience);
        }

        // 5) Time window.
        let leeway = self.policy.leeway_seconds;
        let exp = required_time(&claims, "exp")?;
        let iat = required_time(&claims, "iat")?;
        let nbf = optional_time(&claims, "nbf")?;

        let expired = now >= exp.saturating_add(leeway);
        let not_yet_valid = nbf.is_some_and(|nbf| nbf > now.saturating_add(leeway));
        let issued_in_future = iat > now.saturating_add(leeway);
        if expired || not_yet_valid || issued_in_future {
            debug!(now, exp, iat, ?nbf, leeway, "proof outside its validity window");
            return Err(ProofError::TokenExpiredOrNotYetValid);
        }

        // 6) Single use. The record outlives the last instant the proof could be accepted.
        let jti = claims
            .get("jti")
            .and_then(Value::as_str)
            .filter(|jti| !jti.is_empty())
            .ok_or(ProofError::MissingClaim("jti"))?
            .to_string();

        match self
            .ledger
            .try_claim(&jti, exp.saturating_add(leeway), now)
            .await?
        {
            ClaimOutcome::Claimed => {}
            ClaimOutcome::AlreadyClaimed => return Err(ProofError::ReplayDetected),
        }

        Ok(VerifiedProof {
            key,
            claims: ProofClaims::new(claims),
            jti,
        })
    }
}

fn malformed(e: JwsError) -> ProofError {
    ProofError::Malformed(e.to_string())
}

fn audience_contains(aud: Option<&Value>, issuer: &str) -> bool {
    match aud {
        Some(Value::String(aud)) => aud == issuer,
        Some(Value::Array(auds)) => auds.iter().any(|a| a.as_str() == Some(issuer)),
        _ => false,
    }
}

fn required_time(claims: &JsonObject, name: &'static str) -> Result<i64, ProofError> {
    optional_time(claims, name)?.ok_or(ProofError::MissingClaim(name))
}

fn optional_time(claims: &JsonObject, name: &'static str) -> Result<Option<i64>, ProofError> {
    claims
        .get(name)
        .map(|v| decode_integer(v).map_err(|e| ProofError::InvalidClaim(name, e)))
        .transpose()
}
