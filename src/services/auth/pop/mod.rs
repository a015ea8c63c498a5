mod core;
mod types;

pub use self::core::ProofVerifier;
pub use types::{ProofError, ProofPolicy, VerifiedProof};

#[cfg(test)]
pub use types::ProofClaims;
