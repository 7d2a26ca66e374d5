//! Replayer: drains the outbox against the remote store.

use crate::cache::LocalCache;
use crate::entity::EntityId;
use crate::error::SyncResult;
use crate::events::{EventSink, Severity};
use crate::outbox::{OpKind, Outbox, PendingOperation};
use crate::probe::{ConnState, ConnectivityProbe};
use crate::remote::{RemoteError, RemoteStore};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Successful remote application of one operation.
enum ApplyOutcome {
    Created(crate::remote::RemoteRecord),
    Updated(crate::remote::RemoteRecord),
    Deleted,
}

/// Aggregate result of one drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Operations confirmed and removed from the queue.
    pub succeeded: u64,
    /// Operations that failed or were skipped and remain queued.
    pub failed: u64,
}

/// Replays queued operations once the remote store is reachable.
///
/// Failures are data, not errors: [`Replayer::drain`] only returns `Err`
/// for local store I/O, never for remote outcomes.
pub struct Replayer {
    remote: Arc<dyn RemoteStore>,
    probe: Arc<ConnectivityProbe>,
    outbox: Arc<Outbox>,
    cache: Arc<LocalCache>,
    events: Arc<EventSink>,
    // Shared with every repository. Held while a confirmed operation is
    // removed, reconciled into the cache and its dependents rewritten, so a
    // repository's read-then-queue sequence never interleaves with a
    // promotion and queues an operation against a retired temporary id.
    write_gate: Arc<Mutex<()>>,
}

impl Replayer {
    /// Creates a replayer over the engine's shared components.
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        probe: Arc<ConnectivityProbe>,
        outbox: Arc<Outbox>,
        cache: Arc<LocalCache>,
        events: Arc<EventSink>,
        write_gate: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            remote,
            probe,
            outbox,
            cache,
            events,
            write_gate,
        }
    }

    /// Drains the outbox in replay order.
    ///
    /// Returns `{0, 0}` without touching the network unless the probe's
    /// cached status is `Online`. Operations are attempted in timestamp
    /// order; after one operation for an entity fails, the remaining
    /// operations for that same entity are skipped this cycle (counted as
    /// failed, left queued) so they are never applied out of order.
    /// Independent entities are unaffected by each other's failures.
    ///
    /// When a `Create` replay returns an authoritative id that differs from
    /// the local temporary id, every not-yet-replayed operation referencing
    /// the old id is rewritten - in this batch and in the persisted queue -
    /// before it is attempted. Without the rewrite, a dependent update or
    /// delete would target an entity the remote store has never heard of.
    pub fn drain(&self) -> SyncResult<DrainReport> {
        let mut report = DrainReport::default();

        if self.probe.status() != ConnState::Online {
            debug!("drain skipped: remote not known to be online");
            return Ok(report);
        }

        let mut ops = self.outbox.list()?;
        if ops.is_empty() {
            return Ok(report);
        }
        info!(pending = ops.len(), "draining outbox");

        let mut blocked: HashSet<(String, EntityId)> = HashSet::new();
        let mut index = 0;
        while index < ops.len() {
            let op = ops[index].clone();
            index += 1;

            let key = (op.collection.clone(), op.entity_id.clone());
            if blocked.contains(&key) {
                report.failed += 1;
                continue;
            }

            match self.call_remote(&op) {
                Ok(outcome) => {
                    let _gate = self.write_gate.lock();
                    self.outbox.remove(&op.id)?;
                    report.succeeded += 1;

                    if let Some(new_id) = self.reconcile(&op, outcome)? {
                        for later in ops[index..].iter_mut() {
                            if later.entity_id == op.entity_id {
                                later.entity_id = new_id.clone();
                            }
                        }
                        self.outbox.rewrite_entity_id(&op.entity_id, &new_id)?;
                    }
                }
                Err(e) => {
                    // No caller is waiting on a replay; the operation stays
                    // queued for the next cycle either way. Rejections get a
                    // louder event so operators see the ones that will not
                    // heal on their own.
                    report.failed += 1;
                    blocked.insert(key);
                    warn!(op = %op.id, collection = %op.collection, error = %e, "replay failed, operation stays queued");
                    let severity = match e {
                        RemoteError::Rejected { .. } => Severity::Error,
                        RemoteError::Unavailable { .. } => Severity::Warning,
                    };
                    self.events.record(
                        "Replay failed",
                        format!(
                            "{:?} in '{}' for {} failed ({e}); it stays queued",
                            op.kind, op.collection, op.entity_id
                        ),
                        severity,
                    );
                }
            }
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            "drain cycle finished"
        );
        if report.succeeded > 0 {
            self.events.record(
                "Replay complete",
                format!(
                    "{} queued operation(s) confirmed, {} still pending",
                    report.succeeded, report.failed
                ),
                Severity::Info,
            );
        }
        Ok(report)
    }

    /// Issues the remote call for one operation.
    fn call_remote(&self, op: &PendingOperation) -> Result<ApplyOutcome, RemoteError> {
        let id = op.entity_id.to_string();
        match op.kind {
            OpKind::Create => {
                let record = self.remote.put(&op.collection, Some(&id), &op.payload)?;
                Ok(ApplyOutcome::Created(record))
            }
            OpKind::Update => {
                let record = self.remote.patch(&op.collection, &id, &op.payload)?;
                Ok(ApplyOutcome::Updated(record))
            }
            OpKind::Delete => {
                self.remote.delete(&op.collection, &id)?;
                Ok(ApplyOutcome::Deleted)
            }
        }
    }

    /// Brings the cache in line with a confirmed operation. For a `Create`
    /// whose authoritative id differs from the queued one, returns the new
    /// id so the caller can rewrite dependent operations.
    fn reconcile(&self, op: &PendingOperation, outcome: ApplyOutcome) -> SyncResult<Option<EntityId>> {
        match outcome {
            ApplyOutcome::Created(record) => {
                let new_id = EntityId::remote(record.id.clone());

                if !self.cache.promote(&op.collection, &op.entity_id, &record)? {
                    // Entity vanished from the cache (e.g. never listed);
                    // reinsert the confirmed state.
                    self.cache.upsert(&op.collection, record.to_entity())?;
                }

                Ok((new_id != op.entity_id).then_some(new_id))
            }
            ApplyOutcome::Updated(record) => {
                self.cache.upsert(&op.collection, record.to_entity())?;
                Ok(None)
            }
            ApplyOutcome::Deleted => {
                self.cache.remove(&op.collection, &op.entity_id)?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Document, Entity};
    use crate::outbox::OperationInput;
    use crate::remote::MemoryRemote;
    use serde_json::json;
    use solbill_store::{MemoryBackend, StoreBackend};

    struct Fixture {
        remote: Arc<MemoryRemote>,
        probe: Arc<ConnectivityProbe>,
        outbox: Arc<Outbox>,
        cache: Arc<LocalCache>,
        events: Arc<EventSink>,
        replayer: Replayer,
    }

    fn fixture() -> Fixture {
        let remote = Arc::new(MemoryRemote::new());
        let backend = Arc::new(MemoryBackend::new()) as Arc<dyn StoreBackend>;
        let probe = Arc::new(ConnectivityProbe::new(
            Arc::clone(&remote) as Arc<dyn RemoteStore>
        ));
        let outbox = Arc::new(Outbox::open(Arc::clone(&backend)).unwrap());
        let cache = Arc::new(LocalCache::new(backend));
        let events = Arc::new(EventSink::new());
        let replayer = Replayer::new(
            Arc::clone(&remote) as Arc<dyn RemoteStore>,
            Arc::clone(&probe),
            Arc::clone(&outbox),
            Arc::clone(&cache),
            Arc::clone(&events),
            Arc::new(Mutex::new(())),
        );
        Fixture {
            remote,
            probe,
            outbox,
            cache,
            events,
            replayer,
        }
    }

    fn doc(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn queue_create(fx: &Fixture, fields: Document) -> EntityId {
        let entity = Entity::new_local(fields.clone());
        let id = entity.id.clone();
        fx.cache.upsert("customers", entity).unwrap();
        fx.outbox
            .enqueue(OperationInput {
                kind: OpKind::Create,
                collection: "customers".into(),
                entity_id: id.clone(),
                payload: fields,
            })
            .unwrap();
        id
    }

    #[test]
    fn drain_offline_makes_zero_remote_calls() {
        let fx = fixture();
        queue_create(&fx, Document::new());
        fx.probe.force(ConnState::Offline);

        let report = fx.replayer.drain().unwrap();
        assert_eq!(report, DrainReport::default());
        assert_eq!(fx.remote.call_count(), 0);
        assert_eq!(fx.outbox.len(), 1);
    }

    #[test]
    fn drain_unknown_status_is_also_a_noop() {
        let fx = fixture();
        queue_create(&fx, Document::new());

        let report = fx.replayer.drain().unwrap();
        assert_eq!(report, DrainReport::default());
        assert_eq!(fx.remote.call_count(), 0);
    }

    #[test]
    fn create_replay_promotes_cached_entity() {
        let fx = fixture();
        let temp_id = queue_create(&fx, doc(json!({"name": "Ana"})));
        fx.probe.check();

        let report = fx.replayer.drain().unwrap();
        assert_eq!(report, DrainReport { succeeded: 1, failed: 0 });
        assert!(fx.outbox.is_empty());

        let cached = fx.cache.read_all("customers").unwrap();
        assert_eq!(cached.len(), 1);
        assert!(!cached[0].id.is_local());
        assert!(cached[0].synced);
        assert!(fx.cache.get("customers", &temp_id).unwrap().is_none());

        assert_eq!(fx.remote.records("customers").len(), 1);
    }

    #[test]
    fn dependent_update_is_rewritten_to_remote_id() {
        let fx = fixture();
        let temp_id = queue_create(&fx, doc(json!({"name": "Ana", "city": "Recife"})));
        fx.outbox
            .enqueue(OperationInput {
                kind: OpKind::Update,
                collection: "customers".into(),
                entity_id: temp_id,
                payload: doc(json!({"city": "Natal"})),
            })
            .unwrap();
        fx.probe.check();

        let report = fx.replayer.drain().unwrap();
        assert_eq!(report, DrainReport { succeeded: 2, failed: 0 });

        let records = fx.remote.records("customers");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload["city"], json!("Natal"));
    }

    #[test]
    fn unavailable_failure_leaves_operation_queued() {
        let fx = fixture();
        queue_create(&fx, Document::new());
        fx.probe.check();
        fx.remote.set_available(false);

        let report = fx.replayer.drain().unwrap();
        assert_eq!(report, DrainReport { succeeded: 0, failed: 1 });
        assert_eq!(fx.outbox.len(), 1);

        // Recorded for operators, not raised
        let recent = fx.events.recent(10);
        assert!(recent.iter().any(|e| e.severity == Severity::Warning));
    }

    #[test]
    fn failure_blocks_later_ops_for_same_entity_only() {
        let fx = fixture();
        let victim = queue_create(&fx, Document::new());
        fx.outbox
            .enqueue(OperationInput {
                kind: OpKind::Update,
                collection: "customers".into(),
                entity_id: victim.clone(),
                payload: Document::new(),
            })
            .unwrap();
        let other = queue_create(&fx, Document::new());
        fx.probe.check();
        fx.remote.reject_id(victim.to_string());

        let report = fx.replayer.drain().unwrap();
        // victim create rejected and kept, its dependent update skipped,
        // other entity succeeds
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(fx.outbox.len(), 2);

        let _ = other;
        assert_eq!(fx.remote.records("customers").len(), 1);
    }

    #[test]
    fn rejected_replay_stays_queued_and_is_reported() {
        let fx = fixture();
        let id = queue_create(&fx, Document::new());
        fx.probe.check();
        fx.remote.reject_id(id.to_string());

        let report = fx.replayer.drain().unwrap();
        assert_eq!(report, DrainReport { succeeded: 0, failed: 1 });
        assert_eq!(fx.outbox.len(), 1);

        let recent = fx.events.recent(10);
        assert!(recent.iter().any(|e| e.severity == Severity::Error));
    }

    #[test]
    fn delete_replay_removes_remote_and_cached_state() {
        let fx = fixture();
        let record = fx
            .remote
            .put("customers", Some("cust-1"), &Document::new())
            .unwrap();
        fx.cache.upsert("customers", record.to_entity()).unwrap();
        fx.outbox
            .enqueue(OperationInput {
                kind: OpKind::Delete,
                collection: "customers".into(),
                entity_id: EntityId::remote("cust-1"),
                payload: Document::new(),
            })
            .unwrap();
        fx.probe.check();

        let report = fx.replayer.drain().unwrap();
        assert_eq!(report, DrainReport { succeeded: 1, failed: 0 });
        assert!(fx.remote.records("customers").is_empty());
        assert!(fx.cache.read_all("customers").unwrap().is_empty());
    }
}
