use pathstore_codec::CodecError;
use pathstore_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("short link not found: {0}")]
    NotFound(String),

    #[error("short code already in use: {0}")]
    Conflict(String),

    #[error("invalid short code {code:?}: {source}")]
    InvalidCode {
        code: String,
        #[source]
        source: CodecError,
    },

    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for LinkError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::NotFound(msg) => Self::NotFound(msg),
            other => Self::Store(other),
        }
    }
}

pub type LinkResult<T> = Result<T, LinkError>;
