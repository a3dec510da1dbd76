//! Row-per-key token-cache storage with optimistic concurrency.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;

use sigil_cache::{CacheError, TokenCacheStore};

use crate::PgPool;

/// In-process copy of a row, used for the `last_write` staleness check and as
/// the source of the expected `row_version` on writes.
#[derive(Debug, Clone)]
struct LocalRow {
    payload: Vec<u8>,
    last_write: OffsetDateTime,
    row_version: i64,
}

/// PostgreSQL-backed token-cache store.
///
/// Each store keeps per-key local copies; instances on different replicas
/// converge through the `row_version` CAS on write and the `last_write`
/// comparison on read.
pub struct PostgresTokenStore {
    pool: Arc<PgPool>,
    local: DashMap<String, LocalRow>,
}

impl PostgresTokenStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            local: DashMap::new(),
        }
    }

    /// Creates a store by connecting to the database.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Connection` if the connection fails.
    pub async fn connect(database_url: &str) -> Result<Self, CacheError> {
        use sqlx_core::pool::PoolOptions;
        use sqlx_postgres::Postgres;

        let pool = PoolOptions::<Postgres>::new()
            .connect(database_url)
            .await
            .map_err(map_db_err)?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// Applies the token-cache table schema if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the DDL fails.
    pub async fn ensure_schema(&self) -> Result<(), CacheError> {
        query(include_str!("../migrations/0001_token_cache.sql"))
            .execute(&*self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Reads the current row for `key` and refreshes the local copy.
    async fn read_current(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let row: Option<(Vec<u8>, OffsetDateTime, i64)> = query_as(
            r#"
            SELECT payload, last_write, row_version
            FROM token_cache
            WHERE cache_key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_db_err)?;

        match row {
            Some((payload, last_write, row_version)) => {
                self.local.insert(
                    key.to_string(),
                    LocalRow {
                        payload: payload.clone(),
                        last_write,
                        row_version,
                    },
                );
                Ok(Some(payload))
            }
            None => {
                self.local.remove(key);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl TokenCacheStore for PostgresTokenStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let stamp: Option<(OffsetDateTime,)> = query_as(
            r#"
            SELECT last_write
            FROM token_cache
            WHERE cache_key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_db_err)?;

        let Some((last_write,)) = stamp else {
            self.local.remove(key);
            return Ok(None);
        };

        if let Some(row) = self.local.get(key)
            && row.last_write == last_write
        {
            tracing::trace!(key = %key, "local copy is current, skipping blob read");
            return Ok(Some(row.payload.clone()));
        }

        self.read_current(key).await
    }

    async fn persist(&self, key: &str, payload: &[u8]) -> Result<(), CacheError> {
        for attempt in 0..2 {
            let known_version = self.local.get(key).map(|row| row.row_version);

            let written: Option<(OffsetDateTime, i64)> = match known_version {
                None => {
                    query_as(
                        r#"
                        INSERT INTO token_cache (cache_key, payload, last_write, row_version)
                        VALUES ($1, $2, NOW(), 1)
                        ON CONFLICT (cache_key) DO NOTHING
                        RETURNING last_write, row_version
                        "#,
                    )
                    .bind(key)
                    .bind(payload)
                    .fetch_optional(&*self.pool)
                    .await
                    .map_err(map_db_err)?
                }
                Some(expected) => {
                    query_as(
                        r#"
                        UPDATE token_cache
                        SET payload = $2,
                            last_write = NOW(),
                            row_version = row_version + 1
                        WHERE cache_key = $1
                          AND row_version = $3
                        RETURNING last_write, row_version
                        "#,
                    )
                    .bind(key)
                    .bind(payload)
                    .bind(expected)
                    .fetch_optional(&*self.pool)
                    .await
                    .map_err(map_db_err)?
                }
            };

            if let Some((last_write, row_version)) = written {
                self.local.insert(
                    key.to_string(),
                    LocalRow {
                        payload: payload.to_vec(),
                        last_write,
                        row_version,
                    },
                );
                tracing::trace!(key = %key, row_version, "persisted token cache entry");
                return Ok(());
            }

            // A concurrent writer won the version race; adopt the winning row
            // and retry against its version.
            tracing::debug!(key = %key, attempt, "token cache write lost a version race, re-reading");
            self.read_current(key).await?;
        }

        Err(CacheError::conflict(format!(
            "token cache write for '{key}' lost two consecutive version races"
        )))
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let result = query(
            r#"
            DELETE FROM token_cache
            WHERE cache_key = $1
            "#,
        )
        .bind(key)
        .execute(&*self.pool)
        .await
        .map_err(map_db_err)?;

        self.local.remove(key);
        tracing::trace!(key = %key, removed = result.rows_affected() > 0, "removed token cache entry");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

/// Maps a database error to the cache error taxonomy.
fn map_db_err(e: sqlx_core::Error) -> CacheError {
    CacheError::connection(format!("database error: {e}"))
}
