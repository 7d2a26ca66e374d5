//! The outbox: a durable, ordered queue of pending write operations.

use crate::entity::{now_millis, Document, EntityId};
use crate::error::SyncResult;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use solbill_store::StoreBackend;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Reserved document name the queue is persisted under.
const OUTBOX_DOC: &str = "__outbox__";

/// The kind of a pending write operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    /// Create a new entity.
    Create,
    /// Partially update an existing entity.
    Update,
    /// Delete an entity.
    Delete,
}

/// A write operation awaiting confirmation by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// Opaque operation id.
    pub id: String,
    /// Strictly increasing per-process sequence number; tie-breaker for
    /// operations sharing a timestamp.
    pub seq: u64,
    /// Enqueue time, milliseconds since the Unix epoch. Never decreases
    /// within a process.
    pub timestamp: i64,
    /// Operation kind.
    pub kind: OpKind,
    /// Target collection.
    pub collection: String,
    /// Target entity. A [`EntityId::Local`] target marks an operation
    /// dependent on a still-queued `Create`.
    pub entity_id: EntityId,
    /// Operation payload: the full entity fields for `Create`, the patch
    /// for `Update`, empty for `Delete`.
    pub payload: Document,
}

/// Input to [`Outbox::enqueue`]; id, sequence and timestamp are assigned by
/// the outbox.
#[derive(Debug, Clone)]
pub struct OperationInput {
    /// Operation kind.
    pub kind: OpKind,
    /// Target collection.
    pub collection: String,
    /// Target entity.
    pub entity_id: EntityId,
    /// Operation payload.
    pub payload: Document,
}

#[derive(Debug, Default)]
struct OutboxInner {
    operations: Vec<PendingOperation>,
    next_seq: u64,
    last_timestamp: i64,
}

/// Durable, ordered queue of not-yet-confirmed write operations.
///
/// All access is serialized behind one mutex: the UI thread enqueues while
/// the background replayer lists and removes, and both see a consistent
/// queue. Every mutation is persisted to the store backend before it
/// returns, so the queue survives process restarts.
pub struct Outbox {
    backend: Arc<dyn StoreBackend>,
    inner: Mutex<OutboxInner>,
}

impl Outbox {
    /// Opens the outbox, reloading any queue persisted by a previous run.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted queue cannot be read or decoded.
    pub fn open(backend: Arc<dyn StoreBackend>) -> SyncResult<Self> {
        let mut operations: Vec<PendingOperation> = match backend.load(OUTBOX_DOC)? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => Vec::new(),
        };
        operations.sort_by_key(|op| (op.timestamp, op.seq));

        let next_seq = operations.iter().map(|op| op.seq + 1).max().unwrap_or(0);
        let last_timestamp = operations.iter().map(|op| op.timestamp).max().unwrap_or(0);

        if !operations.is_empty() {
            debug!(pending = operations.len(), "reloaded persisted outbox");
        }

        Ok(Self {
            backend,
            inner: Mutex::new(OutboxInner {
                operations,
                next_seq,
                last_timestamp,
            }),
        })
    }

    /// Appends an operation, assigning its id, sequence and timestamp.
    ///
    /// Timestamps are wall clock, clamped to be strictly increasing within
    /// the process so replay order matches enqueue order even when the
    /// clock stalls or steps backwards.
    ///
    /// # Errors
    ///
    /// Returns an error on store I/O failure; the operation is then not
    /// queued.
    pub fn enqueue(&self, input: OperationInput) -> SyncResult<PendingOperation> {
        let mut inner = self.inner.lock();

        let timestamp = now_millis().max(inner.last_timestamp + 1);
        let operation = PendingOperation {
            id: Uuid::new_v4().to_string(),
            seq: inner.next_seq,
            timestamp,
            kind: input.kind,
            collection: input.collection,
            entity_id: input.entity_id,
            payload: input.payload,
        };

        inner.next_seq += 1;
        inner.last_timestamp = timestamp;
        inner.operations.push(operation.clone());
        self.persist(&inner)?;

        debug!(
            op = %operation.id,
            kind = ?operation.kind,
            collection = %operation.collection,
            entity = %operation.entity_id,
            "operation queued"
        );
        Ok(operation)
    }

    /// Returns all queued operations in replay order (timestamp ascending,
    /// sequence as tie-breaker).
    pub fn list(&self) -> SyncResult<Vec<PendingOperation>> {
        Ok(self.inner.lock().operations.clone())
    }

    /// Removes one operation by id. Removing a missing id is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error on store I/O failure.
    pub fn remove(&self, id: &str) -> SyncResult<()> {
        let mut inner = self.inner.lock();
        let before = inner.operations.len();
        inner.operations.retain(|op| op.id != id);
        if inner.operations.len() != before {
            self.persist(&inner)?;
        }
        Ok(())
    }

    /// Rewrites every queued reference to `old` with `new`.
    ///
    /// Called after a `Create` replay wins an authoritative remote id, so
    /// dependent operations queued against the temporary id target the real
    /// entity. Returns the number of rewritten operations.
    ///
    /// # Errors
    ///
    /// Returns an error on store I/O failure.
    pub fn rewrite_entity_id(&self, old: &EntityId, new: &EntityId) -> SyncResult<usize> {
        let mut inner = self.inner.lock();
        let mut rewritten = 0;
        for op in inner.operations.iter_mut() {
            if op.entity_id == *old {
                op.entity_id = new.clone();
                rewritten += 1;
            }
        }
        if rewritten > 0 {
            self.persist(&inner)?;
            debug!(old = %old, new = %new, count = rewritten, "rewrote queued entity ids");
        }
        Ok(rewritten)
    }

    /// Cancels the queued `Create` for a never-confirmed entity, along with
    /// any dependent operations queued against the same temporary id.
    ///
    /// Returns true if a `Create` was cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error on store I/O failure.
    pub fn cancel_create(&self, entity_id: &EntityId) -> SyncResult<bool> {
        let mut inner = self.inner.lock();
        let had_create = inner
            .operations
            .iter()
            .any(|op| op.kind == OpKind::Create && op.entity_id == *entity_id);
        if !had_create {
            return Ok(false);
        }

        inner.operations.retain(|op| op.entity_id != *entity_id);
        self.persist(&inner)?;
        debug!(entity = %entity_id, "cancelled queued create");
        Ok(true)
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.inner.lock().operations.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, inner: &OutboxInner) -> SyncResult<()> {
        let bytes = serde_json::to_vec(&inner.operations)?;
        self.backend.save(OUTBOX_DOC, &bytes)?;
        Ok(())
    }
}
