//! Store backend trait definition.

use crate::error::StoreResult;

/// A durable named-document store.
///
/// Backends map document names to byte blobs. They provide whole-document
/// load/save semantics - the sync layer reads a snapshot, mutates it, and
/// writes it back under its own locking discipline.
///
/// # Invariants
///
/// - `save` replaces the whole document atomically; a crash never leaves a
///   partially written document behind
/// - after `save` returns, the document survives process termination
/// - `load` returns exactly the bytes of the last completed `save`
/// - `remove` is idempotent
/// - backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::MemoryBackend`] - for testing
/// - [`super::FileBackend`] - for persistent storage
pub trait StoreBackend: Send + Sync {
    /// Loads a document by name.
    ///
    /// Returns `None` if the document does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs or the name is invalid.
    fn load(&self, name: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Saves a document, replacing any previous contents.
    ///
    /// The replacement is atomic and durable on return.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs or the name is invalid.
    fn save(&self, name: &str, data: &[u8]) -> StoreResult<()>;

    /// Removes a document.
    ///
    /// Removing a document that does not exist is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs or the name is invalid.
    fn remove(&self, name: &str) -> StoreResult<()>;

    /// Lists the names of all stored documents, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn list(&self) -> StoreResult<Vec<String>>;
}

/// Returns true if `name` is a valid document name.
///
/// Names are restricted to characters that map cleanly onto file names on
/// every platform the dashboard ships to.
pub(crate) fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_validation() {
        assert!(valid_name("customers"));
        assert!(valid_name("__outbox__"));
        assert!(valid_name("plant-records_2"));
        assert!(!valid_name(""));
        assert!(!valid_name("a/b"));
        assert!(!valid_name("a b"));
        assert!(!valid_name("../escape"));
    }
}
