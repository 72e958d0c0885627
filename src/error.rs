//! Error handling utilities shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::TokenId;

/// Convenient result type used throughout the crate.
pub type Result<T, E = BpeError> = std::result::Result<T, E>;

/// Domain-specific error describing failures during configuration, IO, or tokenizer operations.
#[derive(Debug, Error)]
pub enum BpeError {
    /// Training configuration or special token input failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Encode, decode, or save was requested before the tokenizer was trained or loaded.
    #[error("tokenizer isn't trained")]
    Untrained,
    /// A special token literal was registered more than once.
    #[error("special token {0:?} is already registered")]
    DuplicateSpecialToken(String),
    /// The model file is malformed or truncated.
    #[error("parse error on line {line}: {message}")]
    Parse {
        /// One-based line number inside the model file.
        line: usize,
        /// Description of what was expected.
        message: String,
    },
    /// A token id has no vocabulary entry.
    #[error("token id {0} is not in the vocabulary")]
    UnknownToken(TokenId),
    /// The segmentation pattern failed to compile or to match.
    #[error("pattern error: {0}")]
    Pattern(String),
    /// Filesystem IO error with optional context path.
    #[error("io error while processing {path:?}: {source}")]
    Io {
        /// Underlying IO error returned by the standard library.
        source: std::io::Error,
        /// Target path associated with the IO failure if available.
        path: Option<PathBuf>,
    },
}

impl From<fancy_regex::Error> for BpeError {
    fn from(err: fancy_regex::Error) -> Self {
        Self::Pattern(err.to_string())
    }
}

impl From<regex::Error> for BpeError {
    fn from(err: regex::Error) -> Self {
        Self::Pattern(err.to_string())
    }
}

impl BpeError {
    /// Helper constructor that attaches an optional path when wrapping IO errors.
    pub fn io(source: std::io::Error, path: Option<PathBuf>) -> Self {
        Self::Io { source, path }
    }

    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}
