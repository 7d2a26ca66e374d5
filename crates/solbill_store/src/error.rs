//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
///
/// Store errors are always fatal to the calling operation: the sync engine's
/// correctness depends on durable local state, so it never absorbs them.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The document name contains characters the backend cannot represent.
    #[error("invalid document name: {name}")]
    InvalidName {
        /// The offending name.
        name: String,
    },

    /// Another process holds the store directory.
    #[error("store locked: another process has exclusive access")]
    Locked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StoreError::InvalidName {
            name: "a/b".into(),
        };
        assert!(err.to_string().contains("a/b"));

        assert_eq!(
            StoreError::Locked.to_string(),
            "store locked: another process has exclusive access"
        );
    }
}
