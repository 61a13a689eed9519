use thiserror::Error;

/// Errors from document and short-link storage.
///
/// Backend driver errors never cross this boundary as their own types; they
/// are classified into one of these variants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No row exists for the given key.
    #[error("not found: {0}")]
    NotFound(String),

    /// A write collided with an existing unique key.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backing store is unreachable or did not answer in time.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The payload handed to the store is not valid JSON.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The document path is empty or otherwise unusable.
    #[error("invalid path: {0:?}")]
    InvalidPath(String),

    /// A subpath expression could not be parsed.
    #[error("invalid subpath {expr:?}: {reason}")]
    InvalidSubpath { expr: String, reason: String },

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns `true` when retrying later may succeed.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::MalformedPayload(e.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
