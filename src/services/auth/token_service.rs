use std::sync::Arc;

use tracing::{info, warn};

use crate::error::AppError;
use crate::services::auth::pop::ProofVerifier;
use crate::services::auth::token_issuer::{IssuedToken, TokenIssuer, TokenVariant};
use crate::services::userinfo::{ContextResolver, IdentityClaimsFetcher};

/// Which endpoint variant is being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    IdAssertion,
    IdentityCertification,
}

/// Service-level return type to keep handlers thin.
#[derive(Debug, Clone)]
pub struct Issuance {
    pub token: IssuedToken,
    pub contexts: Vec<String>,
}

/// Orchestrates one issuance: userinfo -> contexts -> proof verification -> signing.
///
/// Both endpoint variants share this path, including replay protection.
#[derive(Clone)]
pub struct IssuanceService {
    userinfo: Arc<dyn IdentityClaimsFetcher>,
    // None when token introspection is not configured; contexts are then empty.
    contexts: Option<Arc<dyn ContextResolver>>,
    verifier: ProofVerifier,
    issuer: TokenIssuer,
}

impl std::fmt::Debug for IssuanceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuanceService")
            .field("verifier", &self.verifier)
            .field("issuer", &self.issuer)
            .field("introspection", &self.contexts.is_some())
            .finish()
    }
}

impl IssuanceService {
    pub fn new(
        userinfo: Arc<dyn IdentityClaimsFetcher>,
        contexts: Option<Arc<dyn ContextResolver>>,
        verifier: ProofVerifier,
        issuer: TokenIssuer,
    ) -> Self {
        Self {
            userinfo,
            contexts,
            verifier,
            issuer,
        }
    }

    pub async fn issue(
        &self,
        bearer: &str,
        proof_token: &str,
        kind: TokenKind,
    ) -> Result<Issuance, AppError> {
        let identity = self.userinfo.fetch(bearer).await.map_err(|e| {
            warn!(error = %e, "userinfo lookup failed");
            AppError::from(e)
        })?;

        let contexts = match (kind, &self.contexts) {
            (TokenKind::IdentityCertification, Some(resolver)) => {
                resolver.authorized_contexts(bearer).await.map_err(|e| {
                    warn!(error = %e, "token introspection failed");
                    AppError::from(e)
                })?
            }
            _ => Vec::new(),
        };

        let now = chrono::Utc::now().timestamp();

        let proof = self
            .verifier
            .verify(proof_token, &identity, now)
            .await
            .map_err(|e| {
                warn!(error = %e, "proof of possession rejected");
                AppError::from(e)
            })?;

        let variant = match kind {
            TokenKind::IdAssertion => TokenVariant::IdAssertion,
            TokenKind::IdentityCertification => TokenVariant::IdentityCertification {
                contexts: contexts.clone(),
            },
        };

        let token = self
            .issuer
            .issue(&proof, &identity, &variant, now)
            .map_err(|e| {
                warn!(error = %e, "token issuance failed");
                AppError::from(e)
            })?;

        info!(
            kind = ?kind,
            proof_jti = %proof.jti,
            expires_in = token.expires_in,
            "token issued"
        );

        Ok(Issuance { token, contexts })
    }
}
