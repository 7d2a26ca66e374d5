//! In-memory store backend for testing.

use crate::backend::{valid_name, StoreBackend};
use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory document store.
///
/// This backend keeps all documents in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral engines that don't need persistence
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use solbill_store::{MemoryBackend, StoreBackend};
///
/// let backend = MemoryBackend::new();
/// backend.save("customers", b"[]").unwrap();
/// assert_eq!(backend.load("customers").unwrap(), Some(b"[]".to_vec()));
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    documents: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Returns true if no documents are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Clears all documents.
    pub fn clear(&self) {
        self.documents.write().clear();
    }
}

impl StoreBackend for MemoryBackend {
    fn load(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        if !valid_name(name) {
            return Err(StoreError::InvalidName { name: name.into() });
        }
        Ok(self.documents.read().get(name).cloned())
    }

    fn save(&self, name: &str, data: &[u8]) -> StoreResult<()> {
        if !valid_name(name) {
            return Err(StoreError::InvalidName { name: name.into() });
        }
        self.documents.write().insert(name.into(), data.to_vec());
        Ok(())
    }

    fn remove(&self, name: &str) -> StoreResult<()> {
        if !valid_name(name) {
            return Err(StoreError::InvalidName { name: name.into() });
        }
        self.documents.write().remove(name);
        Ok(())
    }

    fn list(&self) -> StoreResult<Vec<String>> {
        Ok(self.documents.read().keys().cloned().collect())
    }
}
