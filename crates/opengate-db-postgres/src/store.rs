//! PostgreSQL record storage.
//!
//! All artifact kinds share one `oidc_record` table keyed by id, with the
//! opaque document held as JSONB. Every read filters logically expired rows;
//! physical reclamation is a separate `purge_expired` maintenance call.

use serde_json::Value;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;
use time::{Duration, OffsetDateTime, PrimitiveDateTime};
use tracing::debug;

use async_trait::async_trait;
use opengate_storage::{Consumption, RecordKind, RecordStorage, StoreError, StoreResult, fields};

use crate::config::PostgresConfig;
use crate::error::{Result, store_error};
use crate::{migrations, pool};

// =============================================================================
// PostgreSQL Record Storage
// =============================================================================

/// PostgreSQL-backed protocol-state storage.
///
/// Holds one connection pool for the process lifetime; the pool is the only
/// shared mutable resource and is internally synchronized. Each operation
/// is a single statement, atomic under PostgreSQL row-level locking; no
/// multi-operation transactions are offered across calls.
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Creates storage over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates storage by connecting with the given configuration,
    /// running migrations if configured to.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or a migration fails.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pool = pool::create_pool(config).await?;
        if config.run_migrations {
            migrations::run(&pool).await?;
        }
        Ok(Self::new(pool))
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn expiry_from_ttl(now: OffsetDateTime, ttl_seconds: Option<u64>) -> Option<OffsetDateTime> {
    match ttl_seconds {
        None | Some(0) => None,
        // Lifetimes past the representable range clamp to the far future
        // instead of wrapping negative and birthing an expired record.
        Some(ttl) => {
            let ttl = Duration::seconds(i64::try_from(ttl).unwrap_or(i64::MAX));
            Some(
                now.checked_add(ttl)
                    .unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc()),
            )
        }
    }
}

#[async_trait]
impl RecordStorage for PostgresStorage {
    async fn upsert(
        &self,
        kind: RecordKind,
        id: &str,
        document: &Value,
        ttl_seconds: Option<u64>,
    ) -> StoreResult<()> {
        let expires_at = expiry_from_ttl(OffsetDateTime::now_utc(), ttl_seconds);

        query(
            r#"
            INSERT INTO oidc_record (id, kind, document, expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            ON CONFLICT (id) DO UPDATE
            SET kind = EXCLUDED.kind,
                document = EXCLUDED.document,
                expires_at = EXCLUDED.expires_at,
                updated_at = NOW()
            "#,
        )
        .bind(id)
        .bind(kind.as_str())
        .bind(document)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        debug!(%kind, id, ttl = ?ttl_seconds, "Record upserted");
        Ok(())
    }

    async fn find(&self, kind: RecordKind, id: &str) -> StoreResult<Option<Value>> {
        let row: Option<(Value,)> = query_as(
            r#"
            SELECT document
            FROM oidc_record
            WHERE id = $1
              AND kind = $2
              AND (expires_at IS NULL OR expires_at > NOW())
            "#,
        )
        .bind(id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(|(document,)| document))
    }

    async fn find_by_field(
        &self,
        kind: RecordKind,
        field: &str,
        value: &str,
    ) -> StoreResult<Option<Value>> {
        // The ->> extraction yields NULL for rows where the field is
        // missing or the document is not an object, so malformed records
        // are skipped by the predicate itself.
        let row: Option<(Value,)> = query_as(
            r#"
            SELECT document
            FROM oidc_record
            WHERE kind = $1
              AND document->>$2 = $3
              AND (expires_at IS NULL OR expires_at > NOW())
            LIMIT 1
            "#,
        )
        .bind(kind.as_str())
        .bind(field)
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(|(document,)| document))
    }

    async fn consume(&self, kind: RecordKind, id: &str) -> StoreResult<Consumption> {
        // Single conditional update: the row lock serializes racing callers,
        // and the `NOT (document ? 'consumed')` guard means exactly one of
        // them performs the transition.
        let result = query(
            r#"
            UPDATE oidc_record
            SET document = jsonb_set(
                    document,
                    '{consumed}',
                    to_jsonb(extract(epoch FROM NOW())::bigint)
                ),
                updated_at = NOW()
            WHERE id = $1
              AND kind = $2
              AND (expires_at IS NULL OR expires_at > NOW())
              AND jsonb_typeof(document) = 'object'
              AND NOT (document ? 'consumed')
            "#,
        )
        .bind(id)
        .bind(kind.as_str())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        if result.rows_affected() > 0 {
            debug!(%kind, id, "Record consumed");
            return Ok(Consumption::Consumed);
        }

        // The update matched nothing: missing, expired, already consumed,
        // or a document that cannot carry the marker.
        let row: Option<(Value,)> = query_as(
            r#"
            SELECT document
            FROM oidc_record
            WHERE id = $1
              AND kind = $2
              AND (expires_at IS NULL OR expires_at > NOW())
            "#,
        )
        .bind(id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        match row {
            None => Ok(Consumption::NotFound),
            Some((document,)) if !document.is_object() => Err(StoreError::malformed(format!(
                "{kind} document '{id}' is not a JSON object"
            ))),
            // Either the marker is present, or the record was replaced
            // between the two statements; in both cases this call did not
            // win the transition.
            Some(_) => Ok(Consumption::AlreadyConsumed),
        }
    }

    async fn destroy(&self, kind: RecordKind, id: &str) -> StoreResult<()> {
        let result = query(
            r#"
            DELETE FROM oidc_record
            WHERE id = $1
              AND kind = $2
            "#,
        )
        .bind(id)
        .bind(kind.as_str())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        debug!(%kind, id, removed = result.rows_affected() > 0, "Record destroyed");
        Ok(())
    }

    async fn revoke_by_grant(&self, grant_id: &str) -> StoreResult<u64> {
        // One statement: every row deletion commits together, before this
        // method returns, so no subsequent find on a deleted id can succeed.
        let result = query(
            r#"
            DELETE FROM oidc_record
            WHERE kind <> $2
              AND document->>$3 = $1
              AND (expires_at IS NULL OR expires_at > NOW())
            "#,
        )
        .bind(grant_id)
        .bind(RecordKind::Client.as_str())
        .bind(fields::GRANT_ID)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        let removed = result.rows_affected();
        if removed > 0 {
            debug!(grant_id, removed, "Grant cascade revocation complete");
        }
        Ok(removed)
    }

    async fn purge_expired(&self) -> StoreResult<u64> {
        let result = query(
            r#"
            DELETE FROM oidc_record
            WHERE expires_at IS NOT NULL
              AND expires_at <= NOW()
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        let removed = result.rows_affected();
        debug!(removed, "Purged expired records");
        Ok(removed)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_from_ttl() {
        let now = OffsetDateTime::now_utc();
        assert_eq!(expiry_from_ttl(now, None), None);
        assert_eq!(expiry_from_ttl(now, Some(0)), None);
        assert_eq!(
            expiry_from_ttl(now, Some(3600)),
            Some(now + Duration::seconds(3600))
        );
    }

    #[test]
    fn test_expiry_from_ttl_clamps_huge_lifetimes() {
        let now = OffsetDateTime::now_utc();
        let far = expiry_from_ttl(now, Some(u64::MAX)).unwrap();
        assert!(far > now);
        assert_eq!(
            expiry_from_ttl(now, Some(i64::MAX as u64 + 1)).unwrap(),
            far
        );
    }
}
