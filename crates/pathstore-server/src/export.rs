//! Export of every stored document to a file tree mirroring the path strings.
//!
//! `cs3660/fall2024/attendance.json` lands at
//! `<root>/cs3660/fall2024/attendance.json`, holding the document's `data`
//! as compact JSON. Paths that would escape the root are refused.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info};

use pathstore_store::DocumentStore;

use crate::error::ServerResult;

/// One document that could not be written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExportFailure {
    pub path: String,
    pub reason: String,
}

/// Outcome of an export run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ExportReport {
    pub written: usize,
    pub failures: Vec<ExportFailure>,
}

impl ExportReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failures as one human-readable line.
    pub fn details(&self) -> String {
        self.failures
            .iter()
            .map(|f| format!("{}: {}", f.path, f.reason))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Where `doc_path` goes under `root`, or `None` if it is not a plain
/// relative path.
pub fn target_for(root: &Path, doc_path: &str) -> Option<PathBuf> {
    let relative = Path::new(doc_path);
    let mut parts = relative.components().peekable();
    parts.peek()?;
    if parts.all(|c| matches!(c, Component::Normal(_))) {
        Some(root.join(relative))
    } else {
        None
    }
}

/// Write every stored document under `root`.
///
/// Per-document failures are collected and do not stop the run; a failure
/// to read from the store aborts it.
pub async fn export_tree(store: &DocumentStore, root: &Path) -> ServerResult<ExportReport> {
    let mut report = ExportReport::default();
    let mut rows = store.allrows("%");

    while let Some(page) = rows.next_page().await? {
        for doc in page {
            let Some(target) = target_for(root, &doc.path) else {
                report.failures.push(ExportFailure {
                    path: doc.path,
                    reason: "path escapes the export root".into(),
                });
                continue;
            };
            match write_document(&target, &doc.data).await {
                Ok(()) => {
                    debug!(path = %doc.path, "exported");
                    report.written += 1;
                }
                Err(e) => {
                    error!(path = %doc.path, error = %e, "export write failed");
                    report.failures.push(ExportFailure {
                        path: doc.path,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    info!(
        written = report.written,
        failed = report.failures.len(),
        root = %root.display(),
        "export finished"
    );
    Ok(report)
}

async fn write_document(target: &Path, data: &serde_json::Value) -> std::io::Result<()> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec(data)?;
    tokio::fs::write(target, bytes).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn target_paths() {
        let root = Path::new("/tmp/out");
        assert_eq!(
            target_for(root, "a/b.json"),
            Some(PathBuf::from("/tmp/out/a/b.json"))
        );
        assert_eq!(target_for(root, "../etc/passwd"), None);
        assert_eq!(target_for(root, "a/../../x"), None);
        assert_eq!(target_for(root, "/abs"), None);
        assert_eq!(target_for(root, ""), None);
    }

    #[tokio::test]
    async fn writes_tree() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::in_memory();
        store.save("cs3660/fall2024/attendance.json", &json!({"n": 3})).await.unwrap();
        store.save("top", &json!([1, 2])).await.unwrap();

        let report = export_tree(&store, dir.path()).await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.written, 2);

        let text = std::fs::read_to_string(dir.path().join("cs3660/fall2024/attendance.json")).unwrap();
        assert_eq!(serde_json::from_str::<serde_json::Value>(&text).unwrap(), json!({"n": 3}));
        assert_eq!(std::fs::read_to_string(dir.path().join("top")).unwrap(), "[1,2]");
    }

    #[tokio::test]
    async fn partial_failure_is_reported_and_run_continues() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::in_memory();
        store.save("../escape", &json!(1)).await.unwrap();
        // "a" becomes a file, so "a/b" cannot get a directory.
        store.save("a", &json!(1)).await.unwrap();
        store.save("a/b", &json!(2)).await.unwrap();
        store.save("z", &json!(3)).await.unwrap();

        let report = export_tree(&store, dir.path()).await.unwrap();
        assert!(!report.is_complete());
        assert_eq!(report.written, 2);
        let failed: Vec<_> = report.failures.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(failed, ["../escape", "a/b"]);
        assert!(report.details().contains("escapes"));
    }
}
