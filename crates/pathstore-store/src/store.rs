use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::document::{validate_path, StoredDocument};
use crate::error::{StoreError, StoreResult};
use crate::memory::InMemoryDocumentStore;
use crate::subpath::Subpath;
use crate::traits::DocumentBackend;

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// The document store shared by every protocol bridge.
///
/// Cheap to clone: clones share one backend. Every backend call is bounded
/// by the configured operation timeout and reports
/// [`StoreError::Unavailable`] when it elapses.
#[derive(Clone)]
pub struct DocumentStore {
    backend: Arc<dyn DocumentBackend>,
    timeout: Duration,
    page_size: usize,
}

impl DocumentStore {
    pub fn new(backend: Arc<dyn DocumentBackend>, config: &StoreConfig) -> Self {
        Self {
            backend,
            timeout: config.operation_timeout(),
            page_size: config.page_size.max(1),
        }
    }

    /// A store over a fresh [`InMemoryDocumentStore`] with default settings.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryDocumentStore::new()), &StoreConfig::default())
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(op, timeout_ms = self.timeout.as_millis() as u64, "store operation timed out");
                Err(StoreError::Unavailable(format!(
                    "{op} did not complete within {:?}",
                    self.timeout
                )))
            }
        }
    }

    /// Load the document at `path`, optionally narrowed by a subpath.
    ///
    /// Reads are tolerant: a missing path, a missing subpath segment, or an
    /// unparsable subpath all yield `{}`. Only backend failures are errors.
    /// Use [`Self::fetch`] to tell "absent" from "present but empty".
    pub async fn load(&self, path: &str, subpath: Option<&str>) -> StoreResult<Value> {
        validate_path(path)?;
        debug!(%path, subpath, "load");
        let Some(doc) = self.bounded("load", self.backend.fetch(path)).await? else {
            return Ok(empty_object());
        };

        let Some(expr) = subpath.filter(|s| !s.trim().is_empty()) else {
            return Ok(doc.data);
        };
        match Subpath::parse(expr) {
            Ok(sp) => Ok(sp.resolve(&doc.data).cloned().unwrap_or_else(empty_object)),
            Err(e) => {
                warn!(%path, error = %e, "unparsable subpath, returning empty object");
                Ok(empty_object())
            }
        }
    }

    /// Strict existence check: the full row, or `None` if the path is absent.
    pub async fn fetch(&self, path: &str) -> StoreResult<Option<StoredDocument>> {
        validate_path(path)?;
        self.bounded("fetch", self.backend.fetch(path)).await
    }

    /// Insert or replace the document at `path`.
    pub async fn save(&self, path: &str, data: &Value) -> StoreResult<StoredDocument> {
        validate_path(path)?;
        debug!(%path, "save");
        self.bounded("save", self.backend.upsert(path, data)).await
    }

    /// Deep-merge `partial` into the document at `path`, creating it if
    /// absent. The merge runs inside the backend as one atomic row operation.
    pub async fn combine(&self, path: &str, partial: &Value) -> StoreResult<StoredDocument> {
        validate_path(path)?;
        debug!(%path, "combine");
        self.bounded("combine", self.backend.merge_upsert(path, partial)).await
    }

    /// All documents whose path matches the SQL `LIKE` `pattern`, ordered by
    /// path, fetched lazily one page at a time.
    pub fn allrows(&self, pattern: impl Into<String>) -> AllRows {
        AllRows {
            store: self.clone(),
            pattern: pattern.into(),
            after: None,
            done: false,
        }
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("timeout", &self.timeout)
            .field("page_size", &self.page_size)
            .finish()
    }
}

/// A lazy, restartable sequence of documents from [`DocumentStore::allrows`].
///
/// Pages are fetched by keyset (`path > last seen`), so nothing is held open
/// on the backend between calls and rows written mid-iteration are seen if
/// they sort after the current position.
#[derive(Debug)]
pub struct AllRows {
    store: DocumentStore,
    pattern: String,
    after: Option<String>,
    done: bool,
}

impl AllRows {
    /// The next page of rows, or `None` once the sequence is exhausted.
    pub async fn next_page(&mut self) -> StoreResult<Option<Vec<StoredDocument>>> {
        if self.done {
            return Ok(None);
        }
        let limit = self.store.page_size;
        let page = self
            .store
            .bounded(
                "allrows",
                self.store.backend.scan(&self.pattern, self.after.as_deref(), limit),
            )
            .await?;

        if page.len() < limit {
            self.done = true;
        }
        match page.last() {
            Some(last) => {
                self.after = Some(last.path.clone());
                Ok(Some(page))
            }
            None => {
                self.done = true;
                Ok(None)
            }
        }
    }

    /// Drain the remaining pages into one vector.
    pub async fn collect_all(mut self) -> StoreResult<Vec<StoredDocument>> {
        let mut out = Vec::new();
        while let Some(page) = self.next_page().await? {
            out.extend(page);
        }
        Ok(out)
    }

    /// Start again from the first row.
    pub fn restart(&mut self) {
        self.after = None;
        self.done = false;
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    fn small_pages() -> DocumentStore {
        let config = StoreConfig {
            page_size: 2,
            ..Default::default()
        };
        DocumentStore::new(Arc::new(InMemoryDocumentStore::new()), &config)
    }

    // -----------------------------------------------------------------------
    // load / save / combine
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn save_then_combine_then_load() {
        let store = DocumentStore::in_memory();
        store.save("team/1", &json!({"score": 10})).await.unwrap();
        store.combine("team/1", &json!({"members": ["x"]})).await.unwrap();
        assert_eq!(
            store.load("team/1", None).await.unwrap(),
            json!({"score": 10, "members": ["x"]})
        );
    }

    #[tokio::test]
    async fn missing_path_loads_empty_object() {
        let store = DocumentStore::in_memory();
        assert_eq!(store.load("missing/path", None).await.unwrap(), json!({}));
        assert!(store.fetch("missing/path").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn subpath_reads_are_tolerant() {
        let store = DocumentStore::in_memory();
        store
            .save("class/roster", &json!({"members": [{"name": "ana"}], "size": 1}))
            .await
            .unwrap();
        assert_eq!(store.load("class/roster", Some("size")).await.unwrap(), json!(1));
        assert_eq!(
            store.load("class/roster", Some("members[0].name")).await.unwrap(),
            json!("ana")
        );
        assert_eq!(store.load("class/roster", Some("members[3]")).await.unwrap(), json!({}));
        assert_eq!(store.load("class/roster", Some("a..b")).await.unwrap(), json!({}));
        assert_eq!(store.load("nope", Some("size")).await.unwrap(), json!({}));
        assert_eq!(
            store.load("class/roster", Some("")).await.unwrap(),
            json!({"members": [{"name": "ana"}], "size": 1})
        );
    }

    #[tokio::test]
    async fn saving_stored_data_again_is_idempotent() {
        let store = DocumentStore::in_memory();
        let first = store.save("p", &json!({"a": [1, 2], "b": {"c": null}})).await.unwrap();
        let second = store.save("p", &first.data).await.unwrap();
        assert_eq!(first.data, second.data);
        assert_eq!(store.load("p", None).await.unwrap(), first.data);
    }

    #[tokio::test]
    async fn save_replaces_rather_than_merges() {
        let store = DocumentStore::in_memory();
        store.save("p", &json!({"a": 1})).await.unwrap();
        store.save("p", &json!({"b": 2})).await.unwrap();
        assert_eq!(store.load("p", None).await.unwrap(), json!({"b": 2}));
    }

    #[tokio::test]
    async fn scalar_documents_are_supported() {
        let store = DocumentStore::in_memory();
        store.save("counter", &json!(41)).await.unwrap();
        let doc = store.combine("counter", &json!(42)).await.unwrap();
        assert_eq!(doc.data, json!(42));
    }

    #[tokio::test]
    async fn empty_path_is_rejected() {
        let store = DocumentStore::in_memory();
        assert!(matches!(
            store.save("", &json!({})).await,
            Err(StoreError::InvalidPath(_))
        ));
        assert!(matches!(store.load("/", None).await, Err(StoreError::InvalidPath(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_combines_lose_nothing() {
        let store = DocumentStore::in_memory();
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.combine("shared", &json!({ format!("k{i}"): i })).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        let data = store.load("shared", None).await.unwrap();
        assert_eq!(data.as_object().unwrap().len(), 32);
        assert_eq!(data["k7"], json!(7));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn two_concurrent_combines_both_land() {
        let store = DocumentStore::in_memory();
        let pa = json!({"a": 1});
        let pb = json!({"b": 2});
        let (a, b) = tokio::join!(store.combine("p", &pa), store.combine("p", &pb));
        a.unwrap();
        b.unwrap();
        assert_eq!(store.load("p", None).await.unwrap(), json!({"a": 1, "b": 2}));
    }

    // -----------------------------------------------------------------------
    // allrows
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn allrows_orders_by_path() {
        let store = DocumentStore::in_memory();
        store.save("team/2", &json!({"n": 2})).await.unwrap();
        store.save("team/1", &json!({"n": 1})).await.unwrap();
        store.save("other", &json!({})).await.unwrap();

        let rows = store.allrows("team/%").collect_all().await.unwrap();
        let paths: Vec<_> = rows.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, ["team/1", "team/2"]);
    }

    #[tokio::test]
    async fn allrows_pages_and_restarts() {
        let store = small_pages();
        for i in 0..5 {
            store.save(&format!("doc/{i}"), &json!(i)).await.unwrap();
        }
        let mut rows = store.allrows("doc/%");
        let mut sizes = Vec::new();
        while let Some(page) = rows.next_page().await.unwrap() {
            sizes.push(page.len());
        }
        assert_eq!(sizes, [2, 2, 1]);
        assert!(rows.next_page().await.unwrap().is_none());

        rows.restart();
        let first = rows.next_page().await.unwrap().unwrap();
        assert_eq!(first[0].path, "doc/0");
    }

    #[tokio::test]
    async fn allrows_exact_page_boundary_terminates() {
        let store = small_pages();
        store.save("x/1", &json!(1)).await.unwrap();
        store.save("x/2", &json!(2)).await.unwrap();
        let rows = store.allrows("x/%").collect_all().await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    // -----------------------------------------------------------------------
    // Failure propagation
    // -----------------------------------------------------------------------

    struct StalledBackend;

    #[async_trait]
    impl DocumentBackend for StalledBackend {
        async fn fetch(&self, _path: &str) -> StoreResult<Option<StoredDocument>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }
        async fn upsert(&self, _path: &str, _data: &Value) -> StoreResult<StoredDocument> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn merge_upsert(&self, _path: &str, _p: &Value) -> StoreResult<StoredDocument> {
            Err(StoreError::Conflict("duplicate".into()))
        }
        async fn scan(
            &self,
            _pattern: &str,
            _after: Option<&str>,
            _limit: usize,
        ) -> StoreResult<Vec<StoredDocument>> {
            Ok(Vec::new())
        }
    }

    fn stalled() -> DocumentStore {
        let config = StoreConfig {
            operation_timeout_ms: 20,
            ..Default::default()
        };
        DocumentStore::new(Arc::new(StalledBackend), &config)
    }

    #[tokio::test]
    async fn timeout_becomes_unavailable() {
        let err = stalled().load("a", None).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn backend_errors_are_not_swallowed() {
        let store = stalled();
        assert!(store.save("a", &json!({})).await.unwrap_err().is_unavailable());
        assert!(matches!(
            store.combine("a", &json!({})).await,
            Err(StoreError::Conflict(_))
        ));
    }
}
