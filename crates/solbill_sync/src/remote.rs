//! Remote store capability consumed by the engine.

use crate::entity::{now_millis, Document};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;
use uuid::Uuid;

/// Result type for remote store operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors reported by the remote store capability.
///
/// Implementations collapse the whole transport failure surface (network,
/// timeout, authorization) into [`RemoteError::Unavailable`]: the engine
/// treats them all uniformly as "remote unreachable" and falls back to the
/// local path. [`RemoteError::Rejected`] is the one failure that reaches
/// callers, because replaying a rejected write would repeat the rejection.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The remote store could not be reached or did not answer in time.
    #[error("remote store unavailable: {message}")]
    Unavailable {
        /// Transport-level failure description.
        message: String,
    },

    /// The remote store understood the request and refused it.
    #[error("remote store rejected the request: {message}")]
    Rejected {
        /// Rejection reason.
        message: String,
    },
}

impl RemoteError {
    /// Creates an unavailability error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a rejection error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

/// A record as held by the remote store.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    /// Remote-assigned identifier.
    pub id: String,
    /// Entity payload.
    pub payload: Document,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at: i64,
    /// Last modification time, milliseconds since the Unix epoch.
    pub updated_at: i64,
}

impl RemoteRecord {
    /// Converts this record into a synced cache entity.
    #[must_use]
    pub fn to_entity(&self) -> crate::entity::Entity {
        crate::entity::Entity {
            id: crate::entity::EntityId::remote(self.id.clone()),
            fields: self.payload.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            synced: true,
        }
    }
}

/// The authoritative remote store, as seen by the engine.
///
/// Implementations are expected to enforce a bounded timeout on every call
/// and surface overruns as [`RemoteError::Unavailable`] - the engine never
/// cancels, it only falls back once the deadline passes.
pub trait RemoteStore: Send + Sync {
    /// One cheap round-trip used by the connectivity probe.
    fn ping(&self) -> RemoteResult<()>;

    /// Creates or replaces a record.
    ///
    /// With `id: None` or a client-temporary id, the store assigns an
    /// authoritative id and returns it in the record.
    fn put(&self, collection: &str, id: Option<&str>, payload: &Document)
        -> RemoteResult<RemoteRecord>;

    /// Partially updates an existing record.
    fn patch(&self, collection: &str, id: &str, payload: &Document) -> RemoteResult<RemoteRecord>;

    /// Deletes a record. Deleting a missing record is a no-op.
    fn delete(&self, collection: &str, id: &str) -> RemoteResult<()>;

    /// Fetches one record.
    fn get(&self, collection: &str, id: &str) -> RemoteResult<Option<RemoteRecord>>;

    /// Lists all records in a collection.
    fn list(&self, collection: &str) -> RemoteResult<Vec<RemoteRecord>>;
}

/// An in-memory remote store for tests.
///
/// Supports the fault injection the engine's test suite needs: flipping
/// availability, rejecting requests that target specific ids, and counting
/// round-trips (to assert that offline paths make zero remote calls).
#[derive(Debug, Default)]
pub struct MemoryRemote {
    available: AtomicBool,
    collections: RwLock<HashMap<String, BTreeMap<String, RemoteRecord>>>,
    reject_ids: Mutex<HashSet<String>>,
    calls: AtomicU64,
}

impl MemoryRemote {
    /// Creates a new, reachable, empty remote store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            collections: RwLock::new(HashMap::new()),
            reject_ids: Mutex::new(HashSet::new()),
            calls: AtomicU64::new(0),
        }
    }

    /// Makes the store reachable or unreachable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Rejects any subsequent request that targets `id`.
    pub fn reject_id(&self, id: impl Into<String>) {
        self.reject_ids.lock().insert(id.into());
    }

    /// Clears all configured rejections.
    pub fn clear_rejections(&self) {
        self.reject_ids.lock().clear();
    }

    /// Number of calls made against this store (including failed ones).
    #[must_use]
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Seeds a record directly, bypassing availability checks.
    pub fn seed(&self, collection: &str, record: RemoteRecord) {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(record.id.clone(), record);
    }

    /// Returns all records of a collection, bypassing availability checks.
    #[must_use]
    pub fn records(&self, collection: &str) -> Vec<RemoteRecord> {
        self.collections
            .read()
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }

    fn begin_call(&self) -> RemoteResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteError::unavailable("connection refused"))
        }
    }

    fn check_rejection(&self, id: &str) -> RemoteResult<()> {
        if self.reject_ids.lock().contains(id) {
            Err(RemoteError::rejected(format!("write to {id} refused")))
        } else {
            Ok(())
        }
    }
}

impl RemoteStore for MemoryRemote {
    fn ping(&self) -> RemoteResult<()> {
        self.begin_call()
    }

    fn put(
        &self,
        collection: &str,
        id: Option<&str>,
        payload: &Document,
    ) -> RemoteResult<RemoteRecord> {
        self.begin_call()?;
        if let Some(id) = id {
            self.check_rejection(id)?;
        }

        // Client-temporary ids are never honored; the store assigns its own.
        let id = match id {
            Some(id) if !id.starts_with("local:") => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };

        let now = now_millis();
        let mut collections = self.collections.write();
        let entries = collections.entry(collection.to_string()).or_default();
        let created_at = entries.get(&id).map(|r| r.created_at).unwrap_or(now);
        let record = RemoteRecord {
            id: id.clone(),
            payload: payload.clone(),
            created_at,
            updated_at: now,
        };
        entries.insert(id, record.clone());
        Ok(record)
    }

    fn patch(&self, collection: &str, id: &str, payload: &Document) -> RemoteResult<RemoteRecord> {
        self.begin_call()?;
        self.check_rejection(id)?;

        let mut collections = self.collections.write();
        let record = collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| RemoteError::rejected(format!("no entity {id} in {collection}")))?;

        for (key, value) in payload {
            record.payload.insert(key.clone(), value.clone());
        }
        record.updated_at = now_millis();
        Ok(record.clone())
    }

    fn delete(&self, collection: &str, id: &str) -> RemoteResult<()> {
        self.begin_call()?;
        self.check_rejection(id)?;

        if let Some(entries) = self.collections.write().get_mut(collection) {
            entries.remove(id);
        }
        Ok(())
    }

    fn get(&self, collection: &str, id: &str) -> RemoteResult<Option<RemoteRecord>> {
        self.begin_call()?;
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|c| c.get(id))
            .cloned())
    }

    fn list(&self, collection: &str) -> RemoteResult<Vec<RemoteRecord>> {
        self.begin_call()?;
        Ok(self.records(collection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn put_assigns_id_when_none_supplied() {
        let remote = MemoryRemote::new();
        let record = remote
            .put("customers", None, &doc(json!({"name": "Ana"})))
            .unwrap();
        assert!(!record.id.is_empty());
        assert_eq!(remote.records("customers").len(), 1);
    }

    #[test]
    fn put_replaces_client_temporary_ids() {
        let remote = MemoryRemote::new();
        let record = remote
            .put(
                "customers",
                Some("local:3e9a4f9e-0000-0000-0000-000000000000"),
                &Document::new(),
            )
            .unwrap();
        assert!(!record.id.starts_with("local:"));
    }

    #[test]
    fn put_honors_plain_ids() {
        let remote = MemoryRemote::new();
        let record = remote
            .put("customers", Some("cust-9"), &Document::new())
            .unwrap();
        assert_eq!(record.id, "cust-9");
    }

    #[test]
    fn unavailable_store_fails_every_call() {
        let remote = MemoryRemote::new();
        remote.set_available(false);

        assert!(matches!(
            remote.ping(),
            Err(RemoteError::Unavailable { .. })
        ));
        assert!(matches!(
            remote.list("customers"),
            Err(RemoteError::Unavailable { .. })
        ));
        assert_eq!(remote.call_count(), 2);
    }

    #[test]
    fn patch_missing_entity_is_rejected() {
        let remote = MemoryRemote::new();
        let result = remote.patch("customers", "ghost", &Document::new());
        assert!(matches!(result, Err(RemoteError::Rejected { .. })));
    }

    #[test]
    fn patch_merges_fields() {
        let remote = MemoryRemote::new();
        let record = remote
            .put("customers", None, &doc(json!({"name": "Ana", "city": "Recife"})))
            .unwrap();

        let updated = remote
            .patch("customers", &record.id, &doc(json!({"city": "Natal"})))
            .unwrap();
        assert_eq!(updated.payload["name"], json!("Ana"));
        assert_eq!(updated.payload["city"], json!("Natal"));
    }

    #[test]
    fn rejection_injection_targets_one_id() {
        let remote = MemoryRemote::new();
        let record = remote.put("customers", None, &Document::new()).unwrap();
        remote.reject_id(record.id.clone());

        let result = remote.patch("customers", &record.id, &Document::new());
        assert!(matches!(result, Err(RemoteError::Rejected { .. })));

        // Other ids are untouched
        remote.put("customers", None, &Document::new()).unwrap();
    }

    #[test]
    fn delete_missing_is_noop() {
        let remote = MemoryRemote::new();
        remote.delete("customers", "ghost").unwrap();
    }
}
