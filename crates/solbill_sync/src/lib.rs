//! Local-first write and synchronization engine.
//!
//! The engine keeps a dashboard fully usable without a reachable backing
//! store: every write succeeds immediately against a durable local cache,
//! and writes that could not be confirmed remotely are queued in a durable
//! outbox and replayed in order once connectivity returns.
//!
//! # Architecture
//!
//! - [`SyncEngine`] wires the shared components together and hands out
//!   per-entity-type [`Repository`] handles.
//! - [`LocalCache`] persists one snapshot document per entity collection
//!   through a [`solbill_store::StoreBackend`].
//! - [`Outbox`] is the durable, timestamp-ordered queue of unconfirmed
//!   writes.
//! - [`ConnectivityProbe`] tracks the last known reachability of the
//!   remote store.
//! - [`Replayer`] drains the outbox against the remote store, promoting
//!   locally-created entities to their remote-assigned ids.
//! - [`EventSink`] records human-readable notifications for operators.
//! - [`SyncDriver`] runs the probe-and-drain cycle on a background thread.
//!
//! # Example
//!
//! ```
//! use solbill_sync::{EngineConfig, MemoryRemote, RemoteStore, SyncEngine};
//! use solbill_store::MemoryBackend;
//! use std::sync::Arc;
//!
//! let remote = Arc::new(MemoryRemote::new());
//! let engine = SyncEngine::new(
//!     remote as Arc<dyn RemoteStore>,
//!     Arc::new(MemoryBackend::new()),
//!     EngineConfig::default(),
//! )?;
//!
//! // Resolve connectivity and replay anything a previous run left queued.
//! engine.tick()?;
//! # Ok::<(), solbill_sync::SyncError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod driver;
mod engine;
mod entity;
mod error;
mod events;
mod outbox;
mod probe;
mod remote;
mod replay;
mod repository;

pub use cache::LocalCache;
pub use config::EngineConfig;
pub use driver::SyncDriver;
pub use engine::SyncEngine;
pub use entity::{now_millis, Document, Entity, EntityId, LOCAL_PREFIX};
pub use error::{SyncError, SyncResult};
pub use events::{EventRecord, EventSink, Severity};
pub use outbox::{OpKind, OperationInput, Outbox, PendingOperation};
pub use probe::{ConnState, ConnectivityProbe, StatusSnapshot};
pub use remote::{MemoryRemote, RemoteError, RemoteRecord, RemoteResult, RemoteStore};
pub use replay::{DrainReport, Replayer};
pub use repository::{FieldMapper, Repository};
