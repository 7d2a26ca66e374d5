//! The sync engine: wires the shared components together and hands out
//! per-entity-type repositories.

use crate::cache::LocalCache;
use crate::config::EngineConfig;
use crate::error::SyncResult;
use crate::events::EventSink;
use crate::outbox::Outbox;
use crate::probe::{ConnState, ConnectivityProbe};
use crate::remote::RemoteStore;
use crate::replay::{DrainReport, Replayer};
use crate::repository::{FieldMapper, Repository};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

struct EngineInner {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<LocalCache>,
    outbox: Arc<Outbox>,
    probe: Arc<ConnectivityProbe>,
    events: Arc<EventSink>,
    replayer: Replayer,
    write_gate: Arc<Mutex<()>>,
    config: EngineConfig,
    draining: AtomicBool,
}

/// The local-first sync engine.
///
/// Cheap to clone; all clones share the same cache, outbox, probe and
/// event sink. Construct it once per data directory, hand out
/// [`Repository`] handles per entity type, and run a
/// [`SyncDriver`](crate::driver::SyncDriver) (or call [`SyncEngine::tick`]
/// yourself) to replay queued writes.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    /// Opens the engine over a remote store and a local store backend.
    ///
    /// Reloads any outbox that a previous process left behind. The
    /// connectivity status starts out unknown; the first
    /// [`check`](ConnectivityProbe::check) (normally the driver's first
    /// tick) resolves it.
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        backend: Arc<dyn solbill_store::StoreBackend>,
        config: EngineConfig,
    ) -> SyncResult<Self> {
        let cache = Arc::new(LocalCache::new(Arc::clone(&backend)));
        let outbox = Arc::new(Outbox::open(backend)?);
        let probe = Arc::new(ConnectivityProbe::new(Arc::clone(&remote)));
        let events = Arc::new(EventSink::with_retention(config.event_retention));
        let write_gate = Arc::new(Mutex::new(()));
        let replayer = Replayer::new(
            Arc::clone(&remote),
            Arc::clone(&probe),
            Arc::clone(&outbox),
            Arc::clone(&cache),
            Arc::clone(&events),
            Arc::clone(&write_gate),
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                remote,
                cache,
                outbox,
                probe,
                events,
                replayer,
                write_gate,
                config,
                draining: AtomicBool::new(false),
            }),
        })
    }

    /// Builds a repository for one entity type.
    pub fn repository<M: FieldMapper>(&self, mapper: M) -> Repository<M> {
        Repository::new(
            mapper,
            Arc::clone(&self.inner.remote),
            Arc::clone(&self.inner.probe),
            Arc::clone(&self.inner.cache),
            Arc::clone(&self.inner.outbox),
            Arc::clone(&self.inner.events),
            Arc::clone(&self.inner.write_gate),
        )
    }

    /// The engine's connectivity probe.
    pub fn probe(&self) -> &ConnectivityProbe {
        &self.inner.probe
    }

    /// The engine's event sink.
    pub fn events(&self) -> &EventSink {
        &self.inner.events
    }

    /// The engine's outbox.
    pub fn outbox(&self) -> &Outbox {
        &self.inner.outbox
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// One probe-and-drain cycle: re-check connectivity, then drain the
    /// outbox if the remote store is reachable.
    pub fn tick(&self) -> SyncResult<DrainReport> {
        self.inner.probe.check();
        self.drain()
    }

    /// Drains the outbox once, if the remote store is known to be online.
    ///
    /// Re-entrancy guard: if a drain is already running on another thread
    /// (driver tick racing a manual call), this returns an empty report
    /// instead of interleaving two replays.
    pub fn drain(&self) -> SyncResult<DrainReport> {
        if self
            .inner
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("drain already in progress, skipping");
            return Ok(DrainReport::default());
        }

        let result = self.inner.replayer.drain();
        self.inner.draining.store(false, Ordering::Release);
        result
    }

    /// Number of queued operations awaiting replay.
    pub fn pending(&self) -> usize {
        self.inner.outbox.len()
    }

    /// Last known connectivity state.
    pub fn status(&self) -> ConnState {
        self.inner.probe.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Document, EntityId};
    use crate::error::SyncError;
    use crate::remote::MemoryRemote;
    use serde_json::json;
    use solbill_store::MemoryBackend;
    use std::thread;

    struct RawMapper;

    impl FieldMapper for RawMapper {
        type Record = (EntityId, Document);

        fn collection(&self) -> &str {
            "customers"
        }

        fn to_remote(&self, record: &Self::Record) -> SyncResult<Document> {
            Ok(record.1.clone())
        }

        fn from_remote(&self, id: &EntityId, fields: &Document) -> SyncResult<Self::Record> {
            Ok((id.clone(), fields.clone()))
        }
    }

    fn doc(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn tick_drains_queued_writes_once_online() {
        let remote = Arc::new(MemoryRemote::new());
        remote.set_available(false);
        let engine = SyncEngine::new(
            Arc::clone(&remote) as Arc<dyn RemoteStore>,
            Arc::new(MemoryBackend::new()),
            EngineConfig::default(),
        )
        .unwrap();
        let repo = engine.repository(RawMapper);

        engine.tick().unwrap();
        assert_eq!(engine.status(), ConnState::Offline);

        let (id, _) = repo
            .create(&(EntityId::local(), doc(json!({"name": "Ana"}))))
            .unwrap();
        assert!(id.is_local());
        assert_eq!(engine.pending(), 1);

        remote.set_available(true);
        let report = engine.tick().unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(engine.pending(), 0);
        assert_eq!(remote.records("customers").len(), 1);
    }

    #[test]
    fn drain_without_connectivity_check_is_a_noop() {
        let remote = Arc::new(MemoryRemote::new());
        let engine = SyncEngine::new(
            Arc::clone(&remote) as Arc<dyn RemoteStore>,
            Arc::new(MemoryBackend::new()),
            EngineConfig::default(),
        )
        .unwrap();

        // Status is still Unknown; drain must not touch the remote
        let report = engine.drain().unwrap();
        assert_eq!(report, DrainReport::default());
        assert_eq!(remote.call_count(), 0);
    }

    #[test]
    fn update_with_stale_local_id_after_promotion_is_not_found() {
        let remote = Arc::new(MemoryRemote::new());
        remote.set_available(false);
        let engine = SyncEngine::new(
            Arc::clone(&remote) as Arc<dyn RemoteStore>,
            Arc::new(MemoryBackend::new()),
            EngineConfig::default(),
        )
        .unwrap();
        let repo = engine.repository(RawMapper);

        engine.tick().unwrap();
        let (temp_id, _) = repo
            .create(&(EntityId::local(), doc(json!({"name": "Ana"}))))
            .unwrap();

        remote.set_available(true);
        engine.tick().unwrap();
        assert_eq!(engine.pending(), 0);

        // The temporary id is retired; an update through a stale handle
        // must fail rather than queue an operation no replay can apply.
        let result = repo.update(&temp_id, doc(json!({"name": "Bia"})));
        assert!(matches!(result, Err(SyncError::NotFound { .. })));
        assert_eq!(engine.pending(), 0);
    }

    #[test]
    fn concurrent_updates_during_drain_leave_no_stranded_operations() {
        let remote = Arc::new(MemoryRemote::new());
        remote.set_available(false);
        let engine = SyncEngine::new(
            Arc::clone(&remote) as Arc<dyn RemoteStore>,
            Arc::new(MemoryBackend::new()),
            EngineConfig::default(),
        )
        .unwrap();
        let repo = engine.repository(RawMapper);

        engine.tick().unwrap();
        let mut temp_ids = Vec::new();
        for n in 0..32 {
            let (id, _) = repo
                .create(&(EntityId::local(), doc(json!({"n": n}))))
                .unwrap();
            temp_ids.push(id);
        }
        assert_eq!(engine.pending(), 32);

        remote.set_available(true);
        let background = engine.clone();
        let drainer = thread::spawn(move || {
            background.tick().unwrap();
        });

        // Race updates against the drain. Each one either lands before its
        // create is promoted (and must be rewritten to the remote id) or
        // observes the retired temporary id and fails cleanly.
        for id in &temp_ids {
            match repo.update(id, doc(json!({"touched": true}))) {
                Ok(_) | Err(SyncError::NotFound { .. }) => {}
                Err(e) => panic!("unexpected update error: {e}"),
            }
        }
        drainer.join().unwrap();

        for _ in 0..4 {
            if engine.pending() == 0 {
                break;
            }
            engine.tick().unwrap();
        }
        assert_eq!(engine.pending(), 0, "no operation may stay queued forever");
        assert_eq!(remote.records("customers").len(), 32);
    }

    #[test]
    fn clones_share_state() {
        let remote = Arc::new(MemoryRemote::new());
        let engine = SyncEngine::new(
            Arc::clone(&remote) as Arc<dyn RemoteStore>,
            Arc::new(MemoryBackend::new()),
            EngineConfig::default(),
        )
        .unwrap();
        let clone = engine.clone();

        engine.probe().force(ConnState::Offline);
        let repo = clone.repository(RawMapper);
        repo.create(&(EntityId::local(), Document::new())).unwrap();

        assert_eq!(engine.pending(), 1);
        assert_eq!(clone.pending(), 1);
    }
}
