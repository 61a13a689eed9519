//! Path-addressed JSON document store.
//!
//! Documents are arbitrary JSON values keyed by a slash-delimited path such
//! as `cs3660/fall2024/attendance.json`. Each path owns exactly one row.
//!
//! # Operations
//!
//! - [`DocumentStore::load`] -- exact path, optional subpath, tolerant of
//!   anything missing
//! - [`DocumentStore::save`] -- atomic upsert, replacing the value
//! - [`DocumentStore::combine`] -- atomic upsert, deep-merging the value
//! - [`DocumentStore::allrows`] -- `LIKE` scan in path order, paginated
//!
//! # Storage Backends
//!
//! All backends implement [`DocumentBackend`]; short links have their own
//! [`LinkBackend`]:
//!
//! - [`InMemoryDocumentStore`] / [`InMemoryLinkStore`] -- lock-protected
//!   maps for tests and single-process use
//! - [`PgDocumentStore`] / [`PgLinkStore`] -- PostgreSQL via `sqlx`
//!
//! # Design Rules
//!
//! 1. One row per path; writes are upserts.
//! 2. Merges happen inside the backend, never as a caller-side read-then-write.
//! 3. Every call is bounded by a timeout and fails as `Unavailable` past it.
//! 4. Driver errors are classified, never passed through.

pub mod config;
pub mod document;
pub mod error;
pub mod memory;
pub mod pattern;
pub mod postgres;
pub mod store;
pub mod subpath;
pub mod traits;

use std::sync::Arc;

pub use config::StoreConfig;
pub use document::{validate_path, ShortLink, StoredDocument};
pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryDocumentStore, InMemoryLinkStore};
pub use pattern::LikePattern;
pub use postgres::{PgDocumentStore, PgLinkStore};
pub use store::{AllRows, DocumentStore};
pub use subpath::{Segment, Subpath};
pub use traits::{DocumentBackend, LinkBackend};

/// The pair of row backends one process runs on.
#[derive(Clone)]
pub struct Backends {
    pub documents: Arc<dyn DocumentBackend>,
    pub links: Arc<dyn LinkBackend>,
}

impl Backends {
    /// Fresh in-memory backends.
    pub fn in_memory() -> Self {
        Self {
            documents: Arc::new(InMemoryDocumentStore::new()),
            links: Arc::new(InMemoryLinkStore::new()),
        }
    }

    /// PostgreSQL backends when `database_url` is set, in-memory otherwise.
    /// Both PostgreSQL backends share one pool.
    pub async fn open(config: &StoreConfig) -> StoreResult<Self> {
        match config.database_url.as_deref() {
            Some(url) => {
                let pool = postgres::connect(url, config).await?;
                Ok(Self {
                    documents: Arc::new(PgDocumentStore::new(pool.clone())),
                    links: Arc::new(PgLinkStore::new(pool)),
                })
            }
            None => {
                tracing::info!("no database_url configured, using in-memory storage");
                Ok(Self::in_memory())
            }
        }
    }

    /// A [`DocumentStore`] over these backends.
    pub fn document_store(&self, config: &StoreConfig) -> DocumentStore {
        DocumentStore::new(self.documents.clone(), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn open_without_url_is_in_memory() {
        let config = StoreConfig::default();
        let backends = Backends::open(&config).await.unwrap();
        let store = backends.document_store(&config);
        store.save("a", &json!({"x": 1})).await.unwrap();
        assert_eq!(store.load("a", None).await.unwrap(), json!({"x": 1}));
    }

    #[tokio::test]
    async fn document_stores_share_a_backend() {
        let config = StoreConfig::default();
        let backends = Backends::in_memory();
        let a = backends.document_store(&config);
        let b = backends.document_store(&config);
        a.save("shared", &json!(1)).await.unwrap();
        assert_eq!(b.load("shared", None).await.unwrap(), json!(1));
    }
}
