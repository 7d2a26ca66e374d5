//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync engine operations.
///
/// Only two failure classes reach callers of the write path: a rejected
/// write ([`SyncError::Rejected`]) and a local storage failure
/// ([`SyncError::Storage`]). Remote unavailability is never an error - it
/// routes the operation through the local fallback path instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local cache or outbox I/O failure. Fatal: the engine's correctness
    /// depends on durable local state.
    #[error("storage error: {0}")]
    Storage(#[from] solbill_store::StoreError),

    /// The remote store rejected the request (validation failure). Surfaced
    /// to the caller and not queued - replaying would repeat the rejection.
    #[error("remote store rejected the request: {message}")]
    Rejected {
        /// Rejection reason reported by the remote store.
        message: String,
    },

    /// Entity/operation payloads could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// A record could not be mapped to or from its remote payload shape.
    #[error("field mapping error: {message}")]
    Mapping {
        /// Description of the mapping failure.
        message: String,
    },

    /// The targeted entity is not known locally or remotely.
    #[error("entity not found: {id} in collection {collection}")]
    NotFound {
        /// Collection that was searched.
        collection: String,
        /// The id that was not found.
        id: String,
    },

    /// An identifier string could not be parsed.
    #[error("invalid entity id: {value}")]
    InvalidId {
        /// The unparsable value.
        value: String,
    },
}

impl SyncError {
    /// Creates a mapping error.
    pub fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(collection: impl Into<String>, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id: id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SyncError::Rejected {
            message: "missing required field".into(),
        };
        assert!(err.to_string().contains("missing required field"));

        let err = SyncError::not_found("customers", "c-17");
        assert!(err.to_string().contains("customers"));
        assert!(err.to_string().contains("c-17"));
    }
}
