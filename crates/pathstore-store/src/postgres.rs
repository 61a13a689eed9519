//! PostgreSQL backends.
//!
//! Schema:
//! ```sql
//! CREATE TABLE document_store (
//!   path        TEXT PRIMARY KEY,
//!   data        JSONB NOT NULL,
//!   created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
//!   updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
//! );
//! CREATE TABLE short_urls (
//!   short_id      BIGSERIAL PRIMARY KEY,
//!   url           TEXT NOT NULL,
//!   created_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
//!   access_count  BIGINT NOT NULL DEFAULT 0,
//!   last_accessed TIMESTAMPTZ
//! );
//! ```
//!
//! Every operation is one statement. `combine` merges server-side through
//! `jsonb_deep_merge`, a PL/pgSQL function with the same rule as
//! `pathstore_merge::merge`, inside `INSERT .. ON CONFLICT DO UPDATE`. The
//! row lock taken by the conflict path is what serializes concurrent merges
//! on one path.

use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::document::{ShortLink, StoredDocument};
use crate::error::{StoreError, StoreResult};
use crate::traits::{DocumentBackend, LinkBackend};

/// Schema statements, run in order and idempotent.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS document_store (
        path TEXT PRIMARY KEY,
        data JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS short_urls (
        short_id BIGSERIAL PRIMARY KEY,
        url TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        access_count BIGINT NOT NULL DEFAULT 0,
        last_accessed TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE OR REPLACE FUNCTION jsonb_deep_merge(base jsonb, incoming jsonb)
    RETURNS jsonb
    LANGUAGE plpgsql IMMUTABLE AS $$
    DECLARE
        merged jsonb;
        entry record;
    BEGIN
        IF incoming IS NULL OR jsonb_typeof(incoming) <> 'object' THEN
            RETURN incoming;
        END IF;
        IF base IS NULL OR jsonb_typeof(base) <> 'object' THEN
            merged := '{}'::jsonb;
        ELSE
            merged := base;
        END IF;
        FOR entry IN SELECT key, value FROM jsonb_each(incoming) LOOP
            IF jsonb_typeof(merged -> entry.key) = 'object'
               AND jsonb_typeof(entry.value) = 'object' THEN
                merged := jsonb_set(merged, ARRAY[entry.key],
                                    jsonb_deep_merge(merged -> entry.key, entry.value));
            ELSE
                merged := merged || jsonb_build_object(entry.key, entry.value);
            END IF;
        END LOOP;
        RETURN merged;
    END;
    $$
    "#,
];

/// Postgres SQLSTATE for `query_canceled`, raised by `statement_timeout`.
const QUERY_CANCELED: &str = "57014";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            sqlx::Error::Database(db) if db.code().as_deref() == Some(QUERY_CANCELED) => {
                StoreError::Unavailable(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => StoreError::Unavailable(err.to_string()),
            sqlx::Error::RowNotFound => StoreError::NotFound(err.to_string()),
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

/// Open a pool against `database_url` and install the schema.
pub async fn connect(database_url: &str, config: &StoreConfig) -> StoreResult<PgPool> {
    let options = PgConnectOptions::from_str(database_url)?
        .options([("statement_timeout", config.statement_timeout_ms.to_string())]);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;
    info!(max_connections = config.max_connections, "connected to PostgreSQL");
    Ok(pool)
}

/// Create tables and the merge function if they are missing.
pub async fn init_schema(pool: &PgPool) -> StoreResult<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

fn document_from_row(row: &PgRow) -> StoreResult<StoredDocument> {
    Ok(StoredDocument {
        path: row.try_get("path")?,
        data: row.try_get::<Json<Value>, _>("data")?.0,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn link_from_row(row: &PgRow) -> StoreResult<ShortLink> {
    Ok(ShortLink {
        short_id: row.try_get("short_id")?,
        url: row.try_get("url")?,
        created_at: row.try_get("created_at")?,
        access_count: row.try_get("access_count")?,
        last_accessed: row.try_get("last_accessed")?,
    })
}

/// [`DocumentBackend`] over the `document_store` table.
#[derive(Clone, Debug)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DocumentBackend for PgDocumentStore {
    async fn fetch(&self, path: &str) -> StoreResult<Option<StoredDocument>> {
        let row = sqlx::query(
            "SELECT path, data, created_at, updated_at FROM document_store WHERE path = $1",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(document_from_row).transpose()
    }

    async fn upsert(&self, path: &str, data: &Value) -> StoreResult<StoredDocument> {
        debug!(%path, "upsert");
        let row = sqlx::query(
            r#"
            INSERT INTO document_store (path, data) VALUES ($1, $2)
            ON CONFLICT (path) DO UPDATE SET data = EXCLUDED.data, updated_at = now()
            RETURNING path, data, created_at, updated_at
            "#,
        )
        .bind(path)
        .bind(Json(data))
        .fetch_one(&self.pool)
        .await?;
        document_from_row(&row)
    }

    async fn merge_upsert(&self, path: &str, partial: &Value) -> StoreResult<StoredDocument> {
        debug!(%path, "merge upsert");
        let row = sqlx::query(
            r#"
            INSERT INTO document_store (path, data)
            VALUES ($1, jsonb_deep_merge('{}'::jsonb, $2))
            ON CONFLICT (path) DO UPDATE
                SET data = jsonb_deep_merge(document_store.data, $2), updated_at = now()
            RETURNING path, data, created_at, updated_at
            "#,
        )
        .bind(path)
        .bind(Json(partial))
        .fetch_one(&self.pool)
        .await?;
        document_from_row(&row)
    }

    async fn scan(
        &self,
        pattern: &str,
        after: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<StoredDocument>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            r#"
            SELECT path, data, created_at, updated_at FROM document_store
            WHERE path LIKE $1 AND ($2::text IS NULL OR path COLLATE "C" > $2)
            ORDER BY path COLLATE "C" ASC
            LIMIT $3
            "#,
        )
        .bind(pattern)
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(document_from_row).collect()
    }
}

/// [`LinkBackend`] over the `short_urls` table.
#[derive(Clone, Debug)]
pub struct PgLinkStore {
    pool: PgPool,
}

impl PgLinkStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LinkBackend for PgLinkStore {
    async fn insert(&self, url: &str, short_id: Option<i64>) -> StoreResult<ShortLink> {
        if let Some(id) = short_id {
            let row = sqlx::query(
                r#"
                INSERT INTO short_urls (short_id, url) VALUES ($1, $2)
                RETURNING short_id, url, created_at, access_count, last_accessed
                "#,
            )
            .bind(id)
            .bind(url)
            .fetch_one(&self.pool)
            .await?;
            return link_from_row(&row);
        }

        // Auto ids can collide with ids claimed by custom inserts. Each
        // attempt consumes one sequence value, so the loop moves past any run
        // of claimed ids.
        loop {
            let result = sqlx::query(
                r#"
                INSERT INTO short_urls (url) VALUES ($1)
                RETURNING short_id, url, created_at, access_count, last_accessed
                "#,
            )
            .bind(url)
            .fetch_one(&self.pool)
            .await;
            match result.map_err(StoreError::from) {
                Ok(row) => return link_from_row(&row),
                Err(StoreError::Conflict(msg)) => {
                    debug!(%msg, "assigned short id already claimed, retrying");
                }
                Err(other) => return Err(other),
            }
        }
    }

    async fn touch(&self, short_id: i64) -> StoreResult<Option<ShortLink>> {
        let row = sqlx::query(
            r#"
            UPDATE short_urls
            SET access_count = access_count + 1, last_accessed = now()
            WHERE short_id = $1
            RETURNING short_id, url, created_at, access_count, last_accessed
            "#,
        )
        .bind(short_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(link_from_row).transpose()
    }

    async fn get(&self, short_id: i64) -> StoreResult<Option<ShortLink>> {
        let row = sqlx::query(
            r#"
            SELECT short_id, url, created_at, access_count, last_accessed
            FROM short_urls WHERE short_id = $1
            "#,
        )
        .bind(short_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(link_from_row).transpose()
    }
}
