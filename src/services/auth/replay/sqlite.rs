use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::{debug, info};

use crate::repos::nonce_repo::NonceRepo;
use crate::services::auth::replay::store::{ClaimOutcome, LedgerError, NonceLedger};

/// SQLite-backed nonce ledger.
///
/// The claim is one conditional upsert, so concurrent requests racing on the
/// same identifier resolve inside the database and exactly one wins.
#[derive(Clone, Debug)]
pub struct SqliteNonceLedger {
    repo: NonceRepo,
}

impl SqliteNonceLedger {
    /// Open (or create) the ledger at `url`, e.g. `sqlite://nonces.db`.
    ///
    /// Expired records left over from a previous run are collected here.
    pub async fn open(url: &str) -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(LedgerError::Connect)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(LedgerError::Connect)?;

        let repo = NonceRepo::new(pool);
        repo.ensure_schema().await?;

        let ledger = Self { repo };
        let removed = ledger
            .garbage_collect(chrono::Utc::now().timestamp())
            .await?;
        info!(url, removed, "nonce ledger opened");

        Ok(ledger)
    }

    #[cfg(test)]
    pub fn repo(&self) -> &NonceRepo {
        &self.repo
    }
}

#[async_trait]
impl NonceLedger for SqliteNonceLedger {
    async fn try_claim(
        &self,
        id: &str,
        expires_at: i64,
        now: i64,
    ) -> Result<ClaimOutcome, LedgerError> {
        let claimed = self.repo.claim(id, expires_at, now).await?;

        Ok(if claimed {
            ClaimOutcome::Claimed
        } else {
            debug!(jti = id, "nonce already claimed");
            ClaimOutcome::AlreadyClaimed
        })
    }

    async fn garbage_collect(&self, now: i64) -> Result<u64, LedgerError> {
        Ok(self.repo.delete_expired(now).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    async fn open_temp() -> (tempfile::TempDir, String, SqliteNonceLedger) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("nonces.db").display());
        let ledger = SqliteNonceLedger::open(&url).await.unwrap();
        (dir, url, ledger)
    }

    #[tokio::test]
    async fn second_claim_is_rejected() {
        let (_dir, _url, ledger) = open_temp().await;

        assert_eq!(
            ledger.try_claim("jti-1", 2_000, 1_000).await.unwrap(),
            ClaimOutcome::Claimed
        );
        assert_eq!(
            ledger.try_claim("jti-1", 2_000, 1_001).await.unwrap(),
            ClaimOutcome::AlreadyClaimed
        );
        assert_eq!(
            ledger.try_claim("jti-2", 2_000, 1_001).await.unwrap(),
            ClaimOutcome::Claimed
        );
    }

    #[tokio::test]
    async fn concurrent_claims_have_one_winner() {
        let (_dir, _url, ledger) = open_temp().await;
        let ledger = Arc::new(ledger);

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move { ledger.try_claim("shared", 5_000, 1_000).await })
            })
            .collect();

        let mut claimed = 0;
        for task in tasks {
            if task.await.unwrap().unwrap() == ClaimOutcome::Claimed {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 1);
    }

    #[tokio::test]
    async fn expired_record_can_be_reclaimed_before_gc() {
        let (_dir, _url, ledger) = open_temp().await;

        ledger.try_claim("jti", 1_100, 1_000).await.unwrap();
        assert_eq!(
            ledger.try_claim("jti", 1_300, 1_099).await.unwrap(),
            ClaimOutcome::AlreadyClaimed
        );
        assert_eq!(
            ledger.try_claim("jti", 1_300, 1_100).await.unwrap(),
            ClaimOutcome::Claimed
        );
        assert_eq!(ledger.repo().expires_at("jti").await.unwrap(), Some(1_300));
    }

    #[tokio::test]
    async fn gc_removes_only_expired_records() {
        let (_dir, _url, ledger) = open_temp().await;

        ledger.try_claim("old", 1_000, 900).await.unwrap();
        ledger.try_claim("edge", 1_500, 900).await.unwrap();
        ledger.try_claim("live", 1_501, 900).await.unwrap();

        assert_eq!(ledger.garbage_collect(1_500).await.unwrap(), 2);
        assert_eq!(ledger.repo().expires_at("old").await.unwrap(), None);
        assert_eq!(ledger.repo().expires_at("edge").await.unwrap(), None);
        assert_eq!(ledger.repo().expires_at("live").await.unwrap(), Some(1_501));
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let (_dir, url, ledger) = open_temp().await;
        let far_future = chrono::Utc::now().timestamp() + 3_600;
        let now = chrono::Utc::now().timestamp();

        ledger.try_claim("persisted", far_future, now).await.unwrap();
        drop(ledger);

        let reopened = SqliteNonceLedger::open(&url).await.unwrap();
        assert_eq!(
            reopened.try_claim("persisted", far_future, now).await.unwrap(),
            ClaimOutcome::AlreadyClaimed
        );
    }
}
