//! Backend traits for document rows and short-link rows.
//!
//! Any backend (in-memory, PostgreSQL) implements these to serve as the
//! transactional row store underneath [`crate::DocumentStore`] and the
//! short-link registry.

use async_trait::async_trait;
use serde_json::Value;

use crate::document::{ShortLink, StoredDocument};
use crate::error::StoreResult;

/// Row storage for path-keyed JSON documents.
///
/// Implementations must satisfy these invariants:
/// - At most one row per path. Writes are upserts, never appends.
/// - Every write is atomic at the row level. `merge_upsert` in particular
///   computes the merge inside the backend, so concurrent calls against the
///   same path serialize and none is lost.
/// - Writes to different paths never block each other for longer than a
///   single row operation.
/// - Backend failures are classified into [`crate::StoreError`], never
///   swallowed.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Read the row at `path`.
    ///
    /// Returns `Ok(None)` if no row exists.
    async fn fetch(&self, path: &str) -> StoreResult<Option<StoredDocument>>;

    /// Insert or overwrite the row at `path`, bumping `updated_at`.
    async fn upsert(&self, path: &str, data: &Value) -> StoreResult<StoredDocument>;

    /// Insert `partial` as a new row, or deep-merge it into the existing row
    /// with [`pathstore_merge::merge`] semantics.
    async fn merge_upsert(&self, path: &str, partial: &Value) -> StoreResult<StoredDocument>;

    /// Rows whose path matches the SQL `LIKE` `pattern`, in ascending byte
    /// order, strictly after `after` when given, at most `limit` of them.
    async fn scan(
        &self,
        pattern: &str,
        after: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<StoredDocument>>;
}

/// Row storage for short links keyed by integer id.
#[async_trait]
pub trait LinkBackend: Send + Sync {
    /// Insert a link.
    ///
    /// With `short_id` the row takes that id and fails with
    /// [`crate::StoreError::Conflict`] if it is taken. Without it the backend
    /// assigns the next free id from its counter.
    async fn insert(&self, url: &str, short_id: Option<i64>) -> StoreResult<ShortLink>;

    /// Atomically bump the access counter and last-access time of a link and
    /// return the updated row. Returns `Ok(None)` if the id is unknown.
    async fn touch(&self, short_id: i64) -> StoreResult<Option<ShortLink>>;

    /// Read a link without touching its counters.
    async fn get(&self, short_id: i64) -> StoreResult<Option<ShortLink>>;
}
