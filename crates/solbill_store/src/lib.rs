//! # SolBill Store
//!
//! Durable document store for the SolBill sync engine.
//!
//! This crate provides:
//! - [`StoreBackend`] - the storage trait consumed by the sync layer
//! - [`MemoryBackend`] - in-memory store for tests and ephemeral engines
//! - [`FileBackend`] - file-per-document store that survives restarts
//!
//! Backends are **opaque byte stores** addressed by document name. The sync
//! layer owns all interpretation: a document may be an entity-collection
//! snapshot or the pending-operation queue, but the backend never knows.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StoreBackend;
pub use error::{StoreError, StoreResult};
pub use file::FileBackend;
pub use memory::MemoryBackend;
