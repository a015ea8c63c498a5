use async_trait::async_trait;

use crate::repos::error::RepoError;

/// Outcome of claiming a single-use identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    AlreadyClaimed,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("nonce ledger connection error: {0}")]
    Connect(#[source] sqlx::Error),

    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Durable set of single-use identifiers with expiry.
///
/// Any `Err` must be treated as a verification failure by callers (fail closed).
#[async_trait]
pub trait NonceLedger: Send + Sync {
    // Atomically record `id` until `expires_at` (unix seconds).
    //
    // Returns:
    // - Ok(Claimed)        => first use (or the previous record had expired)
    // - Ok(AlreadyClaimed) => an unexpired record already holds `id`
    async fn try_claim(
        &self,
        id: &str,
        expires_at: i64,
        now: i64,
    ) -> Result<ClaimOutcome, LedgerError>;

    // Remove records with `expires_at <= now`. Returns the number removed.
    async fn garbage_collect(&self, now: i64) -> Result<u64, LedgerError>;
}
