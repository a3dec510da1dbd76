//! # sigil-cache-postgres
//!
//! PostgreSQL token-cache store: one row per owner key, optimistic
//! concurrency via a `row_version` column, and a `last_write` staleness check
//! that lets a replica skip re-reading the blob when nothing changed.
//!
//! Concurrent writers to the same key are reconciled, not failed: a version
//! conflict re-reads the winning row and retries the write once against the
//! fresh version. Only a second consecutive conflict — which two writers
//! cannot produce on their own — surfaces as an error.
//!
//! The table schema lives in `migrations/0001_token_cache.sql`;
//! [`PostgresTokenStore::ensure_schema`] applies it for hosts without a
//! migration runner.

mod store;

use sqlx_core::pool::Pool;
use sqlx_postgres::Postgres;

pub use store::PostgresTokenStore;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;
