use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::{Value, json};
use tracing::debug;

use crate::services::auth::identity::IdentityClaims;
use crate::services::auth::jws::JsonObject;
use crate::services::auth::jwt::{JwtSigner, SignerError};
use crate::services::auth::pop::VerifiedProof;

/// Which token the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenVariant {
    /// ID assertion token (`/iat`).
    IdAssertion,
    /// Identity certification token (`/ict`), carrying a fresh `jti` and the
    /// authorized end-to-end contexts in `ctx`.
    IdentityCertification { contexts: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct IssuanceSettings {
    pub issuer: String,
    // Seconds. Invariant: 1 <= default_lifetime <= max_lifetime.
    pub default_lifetime: i64,
    pub max_lifetime: i64,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: i64,
    // Sorted names of the identity claims copied into the token.
    pub claim_names: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    #[error("subject missing from identity claims")]
    SubjectMissing,
    #[error("entropy source failed: {0}")]
    Entropy(getrandom::Error),
    #[error(transparent)]
    SigningFailed(#[from] SignerError),
}

#[derive(Clone, Debug)]
pub struct TokenIssuer {
    signer: JwtSigner,
    settings: IssuanceSettings,
}

impl TokenIssuer {
    pub fn new(signer: JwtSigner, settings: IssuanceSettings) -> Self {
        Self { signer, settings }
    }

    /// Build and sign a token bound to the proof's key.
    pub fn issue(
        &self,
        proof: &VerifiedProof,
        identity: &IdentityClaims,
        variant: &TokenVariant,
        now: i64,
    ) -> Result<IssuedToken, IssueError> {
        let sub = identity.subject().ok_or(IssueError::SubjectMissing)?;
        let lifetime = self.lifetime(proof.claims.token_lifetime());

        let mut claims = select_claims(identity, proof.claims.token_claims());
        let mut claim_names: Vec<String> = claims.keys().cloned().collect();
        claim_names.sort();

        let nonce = match proof.claims.token_nonce() {
            Some(nonce) => nonce.to_string(),
            None => random_token()?,
        };

        claims.insert("sub".into(), Value::from(sub));
        claims.insert("iss".into(), Value::from(self.settings.issuer.as_str()));
        claims.insert("nonce".into(), Value::from(nonce));
        claims.insert("iat".into(), Value::from(now));
        claims.insert("nbf".into(), Value::from(now));
        claims.insert("exp".into(), Value::from(now + lifetime));
        claims.insert("cnf".into(), json!({ "jwk": proof.key.echo_jwk() }));

        if let TokenVariant::IdentityCertification { contexts } = variant {
            claims.insert("jti".into(), Value::from(random_token()?));
            claims.insert("ctx".into(), json!(contexts));
        }

        let token = self.signer.sign(&claims)?;

        debug!(
            sub,
            lifetime,
            claims = claim_names.len(),
            alg = %self.signer.algorithm(),
            "issued token"
        );

        Ok(IssuedToken {
            token,
            expires_in: lifetime,
            claim_names,
        })
    }

    /// Requested lifetime clamped to `[1, max]`; default when absent or non-positive.
    fn lifetime(&self, requested: Option<i64>) -> i64 {
        match requested {
            Some(requested) if requested > 0 => requested.min(self.settings.max_lifetime),
            _ => self.settings.default_lifetime,
        }
    }
}

fn select_claims(identity: &IdentityClaims, allow_list: Option<&str>) -> JsonObject {
    let Some(allow_list) = allow_list else {
        return identity.as_map().clone();
    };

    allow_list
        .split(' ')
        .filter(|name| !name.is_empty())
        .filter_map(|name| identity.get(name).map(|v| (name.to_string(), v.clone())))
        .collect()
}

/// 32 random bytes, base64url without padding.
pub fn random_token() -> Result<String, IssueError> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes).map_err(IssueError::Entropy)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
