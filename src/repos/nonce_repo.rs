/*
 * Responsibility
 * - nonces テーブル向け SQLx 操作 (single-use proof identifiers)
 * - expires_at は unix seconds。expires_at <= now の行は期限切れ扱い
 */
use sqlx::SqlitePool;

use crate::repos::error::RepoResult;

#[derive(Clone, Debug)]
pub struct NonceRepo {
    pool: SqlitePool,
}

impl NonceRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> RepoResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS nonces (
                id TEXT PRIMARY KEY NOT NULL,
                expires_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS nonces_expires_at_idx ON nonces (expires_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // Record `id` unless an unexpired record already holds it.
    //
    // An expired record is overwritten in place, so reuse after expiry does not
    // depend on garbage collection having run. Returns true when this call won.
    pub async fn claim(&self, id: &str, expires_at: i64, now: i64) -> RepoResult<bool> {
        let res = sqlx::query(
            r#"
            INSERT INTO nonces (id, expires_at)
            VALUES (?1, ?2)
            ON CONFLICT (id) DO UPDATE
                SET expires_at = excluded.expires_at
                WHERE nonces.expires_at <= ?3
            "#,
        )
        .bind(id)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() == 1)
    }

    pub async fn delete_expired(&self, now: i64) -> RepoResult<u64> {
        let res = sqlx::query(
            r#"
            DELETE FROM nonces
            WHERE expires_at <= ?1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected())
    }

    #[cfg(test)]
    pub async fn expires_at(&self, id: &str) -> RepoResult<Option<i64>> {
        let row = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT expires_at
            FROM nonces
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}
