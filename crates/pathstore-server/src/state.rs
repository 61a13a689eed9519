use std::path::PathBuf;
use std::sync::Arc;

use pathstore_links::ShortLinkRegistry;
use pathstore_store::DocumentStore;

/// Everything a request handler can reach. Built once per process.
#[derive(Clone, Debug)]
pub struct AppState {
    pub store: DocumentStore,
    pub links: ShortLinkRegistry,
    pub export_root: Arc<PathBuf>,
}

impl AppState {
    pub fn new(store: DocumentStore, links: ShortLinkRegistry, export_root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            links,
            export_root: Arc::new(export_root.into()),
        }
    }

    /// In-memory state for tests and demos.
    pub fn in_memory(export_root: impl Into<PathBuf>) -> Self {
        Self::new(DocumentStore::in_memory(), ShortLinkRegistry::in_memory(), export_root)
    }
}
