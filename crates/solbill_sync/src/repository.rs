//! Generic entity repository: the per-entity-type façade over the engine.
//!
//! One `Repository` replaces the per-entity copy of the fallback logic the
//! dashboard used to carry: every operation attempts the remote store
//! first and falls back to the local cache plus outbox on failure, so the
//! caller sees an immediately successful write either way.

use crate::cache::LocalCache;
use crate::entity::{Document, Entity, EntityId};
use crate::error::{SyncError, SyncResult};
use crate::events::{EventSink, Severity};
use crate::outbox::{OpKind, OperationInput, Outbox};
use crate::probe::{ConnState, ConnectivityProbe};
use crate::remote::{RemoteError, RemoteStore};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Pure field mapping between a domain record and its remote payload.
///
/// Supplied per entity type; the engine never hard-codes entity shape.
pub trait FieldMapper: Send + Sync {
    /// The domain record type.
    type Record;

    /// Name of the remote collection this mapper serves.
    fn collection(&self) -> &str;

    /// Maps a record to its remote payload (without the id).
    fn to_remote(&self, record: &Self::Record) -> SyncResult<Document>;

    /// Builds a record from an id and a remote payload.
    fn from_remote(&self, id: &EntityId, fields: &Document) -> SyncResult<Self::Record>;
}

/// Per-entity-type repository, parameterized by collection name and field
/// mapper.
///
/// Remote-store failures never propagate from these methods; they route the
/// operation through the local path. Only a remote *rejection*
/// ([`SyncError::Rejected`]) or a local storage failure
/// ([`SyncError::Storage`]) reaches the caller.
pub struct Repository<M: FieldMapper> {
    mapper: M,
    remote: Arc<dyn RemoteStore>,
    probe: Arc<ConnectivityProbe>,
    cache: Arc<LocalCache>,
    outbox: Arc<Outbox>,
    events: Arc<EventSink>,
    // Shared with the replayer. Held across every local-id read-then-queue
    // sequence so a concurrent drain cannot promote the entity between the
    // cache read and the enqueue, which would strand an operation against
    // the stale temporary id.
    write_gate: Arc<Mutex<()>>,
}

impl<M: FieldMapper> Repository<M> {
    pub(crate) fn new(
        mapper: M,
        remote: Arc<dyn RemoteStore>,
        probe: Arc<ConnectivityProbe>,
        cache: Arc<LocalCache>,
        outbox: Arc<Outbox>,
        events: Arc<EventSink>,
        write_gate: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            mapper,
            remote,
            probe,
            cache,
            outbox,
            events,
            write_gate,
        }
    }

    /// Name of the collection this repository serves.
    pub fn collection(&self) -> &str {
        self.mapper.collection()
    }

    /// Creates an entity.
    ///
    /// When the remote store confirms the write, the returned record
    /// carries the remote-assigned id. Otherwise the record carries a local
    /// temporary id and the create is queued for replay - the caller cannot
    /// tell the difference except via the id tag.
    pub fn create(&self, record: &M::Record) -> SyncResult<M::Record> {
        let collection = self.mapper.collection().to_string();
        let fields = self.mapper.to_remote(record)?;

        if self.probe.status() == ConnState::Online {
            match self.remote.put(&collection, None, &fields) {
                Ok(stored) => {
                    let entity = stored.to_entity();
                    self.cache.upsert(&collection, entity.clone())?;
                    return self.mapper.from_remote(&entity.id, &entity.fields);
                }
                Err(RemoteError::Rejected { message }) => {
                    return Err(SyncError::Rejected { message });
                }
                Err(RemoteError::Unavailable { message }) => {
                    warn!(%collection, %message, "remote create failed, falling back to local write");
                    self.probe.force(ConnState::Offline);
                }
            }
        }

        let entity = Entity::new_local(fields.clone());
        self.cache.upsert(&collection, entity.clone())?;
        self.outbox.enqueue(OperationInput {
            kind: OpKind::Create,
            collection: collection.clone(),
            entity_id: entity.id.clone(),
            payload: fields,
        })?;
        self.events.record(
            "Write queued",
            format!("A create in '{collection}' was stored locally and will sync once the remote store is reachable."),
            Severity::Info,
        );
        self.mapper.from_remote(&entity.id, &entity.fields)
    }

    /// Partially updates an entity.
    ///
    /// An update targeting a local temporary id is always queued: it
    /// depends on the still-pending create and is rewritten to the remote
    /// id during replay.
    pub fn update(&self, id: &EntityId, patch: Document) -> SyncResult<M::Record> {
        let collection = self.mapper.collection().to_string();

        if !id.is_local() && self.probe.status() == ConnState::Online {
            match self.remote.patch(&collection, &id.to_string(), &patch) {
                Ok(stored) => {
                    let entity = stored.to_entity();
                    self.cache.upsert(&collection, entity.clone())?;
                    return self.mapper.from_remote(&entity.id, &entity.fields);
                }
                Err(RemoteError::Rejected { message }) => {
                    return Err(SyncError::Rejected { message });
                }
                Err(RemoteError::Unavailable { message }) => {
                    warn!(%collection, %message, "remote update failed, falling back to local write");
                    self.probe.force(ConnState::Offline);
                }
            }
        }

        // Under the gate a concurrent drain cannot promote this entity
        // mid-sequence; a stale local-id handle fails with NotFound here
        // instead of queueing an operation no replay could ever apply.
        let _gate = self.write_gate.lock();
        let mut entity = self
            .cache
            .get(&collection, id)?
            .ok_or_else(|| SyncError::not_found(&collection, id))?;
        entity.merge_patch(&patch);
        entity.synced = false;
        self.cache.upsert(&collection, entity.clone())?;
        self.outbox.enqueue(OperationInput {
            kind: OpKind::Update,
            collection: collection.clone(),
            entity_id: id.clone(),
            payload: patch,
        })?;
        self.events.record(
            "Write queued",
            format!("An update in '{collection}' was stored locally and will sync once the remote store is reachable."),
            Severity::Info,
        );
        self.mapper.from_remote(&entity.id, &entity.fields)
    }

    /// Deletes an entity.
    ///
    /// Deleting an entity whose create is still queued cancels the queued
    /// create (and its dependents) instead of enqueueing a delete - there
    /// is no value in creating-then-deleting remotely.
    ///
    /// A remote rejection propagates and leaves the cached entity in
    /// place: the caller is told the delete did not happen, and local
    /// state agrees.
    pub fn delete(&self, id: &EntityId) -> SyncResult<bool> {
        let collection = self.mapper.collection().to_string();

        if id.is_local() {
            let _gate = self.write_gate.lock();
            let existed = self.cache.remove(&collection, id)?;
            let cancelled = self.outbox.cancel_create(id)?;
            if cancelled {
                debug!(%collection, entity = %id, "queued create cancelled by delete");
            }
            return Ok(existed || cancelled);
        }

        if self.probe.status() == ConnState::Online {
            match self.remote.delete(&collection, &id.to_string()) {
                Ok(()) => {
                    self.cache.remove(&collection, id)?;
                    return Ok(true);
                }
                Err(RemoteError::Rejected { message }) => {
                    // The caller is told the delete did not happen, so the
                    // entity must stay cached.
                    return Err(SyncError::Rejected { message });
                }
                Err(RemoteError::Unavailable { message }) => {
                    warn!(%collection, %message, "remote delete failed, queueing for replay");
                    self.probe.force(ConnState::Offline);
                }
            }
        }

        self.cache.remove(&collection, id)?;
        self.outbox.enqueue(OperationInput {
            kind: OpKind::Delete,
            collection: collection.clone(),
            entity_id: id.clone(),
            payload: Document::new(),
        })?;
        self.events.record(
            "Write queued",
            format!("A delete in '{collection}' was stored locally and will sync once the remote store is reachable."),
            Severity::Info,
        );
        Ok(true)
    }

    /// Fetches one entity by id.
    ///
    /// Local temporary ids are only ever served from the cache. Remote ids
    /// are read through: remote first when online, cache otherwise.
    pub fn get(&self, id: &EntityId) -> SyncResult<Option<M::Record>> {
        let collection = self.mapper.collection().to_string();

        if !id.is_local() && self.probe.status() == ConnState::Online {
            match self.remote.get(&collection, &id.to_string()) {
                Ok(Some(stored)) => {
                    let entity = stored.to_entity();
                    self.cache.upsert(&collection, entity.clone())?;
                    return Ok(Some(self.mapper.from_remote(&entity.id, &entity.fields)?));
                }
                Ok(None) => {
                    // The remote answer is authoritative: a confirmed cache
                    // entry it no longer holds is evicted. An unsynced entry
                    // keeps serving its pending local state.
                    if let Some(entity) = self.cache.get(&collection, id)? {
                        if entity.synced {
                            self.cache.remove(&collection, id)?;
                            return Ok(None);
                        }
                    }
                }
                Err(e) => {
                    debug!(%collection, error = %e, "remote get failed, serving from cache");
                    if matches!(e, RemoteError::Unavailable { .. }) {
                        self.probe.force(ConnState::Offline);
                    }
                }
            }
        }

        match self.cache.get(&collection, id)? {
            Some(entity) => Ok(Some(self.mapper.from_remote(&entity.id, &entity.fields)?)),
            None => Ok(None),
        }
    }

    /// Lists all entities of the collection.
    ///
    /// When the remote store is reachable, the remote result set is merged
    /// with every cached entry it has not yet confirmed - offline creates
    /// (local ids) and offline updates (remote ids still flagged unsynced)
    /// - de-duplicated by id, with the unsynced local state winning.
    /// Entities with a queued delete are withheld. The merged snapshot
    /// replaces the cached one. When unreachable, the cache serves the
    /// whole result.
    pub fn list(&self) -> SyncResult<Vec<M::Record>> {
        let collection = self.mapper.collection().to_string();

        if self.probe.status() == ConnState::Online {
            match self.remote.list(&collection) {
                Ok(records) => {
                    let pending_deletes: HashSet<EntityId> = self
                        .outbox
                        .list()?
                        .into_iter()
                        .filter(|op| op.collection == collection && op.kind == OpKind::Delete)
                        .map(|op| op.entity_id)
                        .collect();

                    let mut merged: Vec<Entity> = records
                        .iter()
                        .map(|r| r.to_entity())
                        .filter(|e| !pending_deletes.contains(&e.id))
                        .collect();

                    for entity in self
                        .cache
                        .read_all(&collection)?
                        .into_iter()
                        .filter(|e| !e.synced)
                    {
                        match merged.iter_mut().find(|m| m.id == entity.id) {
                            // A pending update keeps its optimistic value
                            Some(slot) => *slot = entity,
                            // An offline create not yet replayed
                            None => merged.push(entity),
                        }
                    }

                    self.cache.write_all(&collection, &merged)?;
                    return merged
                        .iter()
                        .map(|e| self.mapper.from_remote(&e.id, &e.fields))
                        .collect();
                }
                Err(e) => {
                    warn!(%collection, error = %e, "remote list failed, serving from cache");
                    if matches!(e, RemoteError::Unavailable { .. }) {
                        self.probe.force(ConnState::Offline);
                    }
                }
            }
        }

        self.cache
            .read_all(&collection)?
            .iter()
            .map(|e| self.mapper.from_remote(&e.id, &e.fields))
            .collect()
    }
}
