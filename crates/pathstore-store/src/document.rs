use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};

/// One stored document: the row behind a path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub path: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredDocument {
    /// A fresh row stamped with the current time.
    pub fn new(path: impl Into<String>, data: Value) -> Self {
        let now = Utc::now();
        Self {
            path: path.into(),
            data,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A short-link row. `short_id` is the internal key; the encoded token is
/// derived from it and never stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShortLink {
    pub short_id: i64,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub access_count: i64,
    pub last_accessed: Option<DateTime<Utc>>,
}

/// Check that a document path is usable as a key.
pub fn validate_path(path: &str) -> StoreResult<()> {
    if path.trim_matches('/').is_empty() {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_document_has_equal_timestamps() {
        let doc = StoredDocument::new("a/b", json!({"x": 1}));
        assert_eq!(doc.created_at, doc.updated_at);
        assert_eq!(doc.path, "a/b");
    }

    #[test]
    fn envelope_serializes_all_fields() {
        let doc = StoredDocument::new("team/1", json!({"score": 10}));
        let v = serde_json::to_value(&doc).unwrap();
        assert_eq!(v["path"], "team/1");
        assert_eq!(v["data"], json!({"score": 10}));
        assert!(v.get("created_at").is_some());
        assert!(v.get("updated_at").is_some());
    }

    #[test]
    fn path_validation() {
        assert!(validate_path("cs3660/fall2024/attendance.json").is_ok());
        assert!(validate_path("").is_err());
        assert!(validate_path("///").is_err());
    }
}
