use thiserror::Error;

/// Errors produced by the short-token codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid character {ch:?} at position {position}")]
    InvalidCharacter { ch: char, position: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid alphabet: {0}")]
    InvalidAlphabet(String),
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
