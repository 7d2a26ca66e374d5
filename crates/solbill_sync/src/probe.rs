//! Connectivity probe: cheap reachability checks, cached process-wide.

use crate::remote::RemoteStore;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

/// Last known reachability of the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// The last probe round-trip succeeded.
    Online,
    /// The last probe round-trip failed (timeout, network, auth).
    Offline,
    /// No probe has run yet.
    Unknown,
}

/// The cached probe result.
#[derive(Debug, Clone, Copy)]
pub struct StatusSnapshot {
    /// Last known state.
    pub state: ConnState,
    /// When the state was recorded. `None` until the first probe.
    pub checked_at: Option<SystemTime>,
}

/// Probes the remote store and caches a binary online/offline status.
///
/// Write-path callers read the cached value via [`ConnectivityProbe::status`]
/// and never stall on a fresh round-trip; only [`ConnectivityProbe::check`]
/// (driven by the background loop, or invoked explicitly) touches the
/// network. Probe failures are not retried inline - the periodic driver
/// re-probes on its own cadence.
pub struct ConnectivityProbe {
    remote: Arc<dyn RemoteStore>,
    status: RwLock<StatusSnapshot>,
}

impl ConnectivityProbe {
    /// Creates a probe over the given remote store.
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            remote,
            status: RwLock::new(StatusSnapshot {
                state: ConnState::Unknown,
                checked_at: None,
            }),
        }
    }

    /// Performs one probe round-trip and updates the cached status.
    ///
    /// Any error yields [`ConnState::Offline`].
    pub fn check(&self) -> ConnState {
        let state = match self.remote.ping() {
            Ok(()) => ConnState::Online,
            Err(e) => {
                debug!(error = %e, "connectivity probe failed");
                ConnState::Offline
            }
        };
        self.record(state);
        state
    }

    /// Returns the last cached state without a round-trip.
    pub fn status(&self) -> ConnState {
        self.status.read().state
    }

    /// Returns the full cached snapshot.
    pub fn snapshot(&self) -> StatusSnapshot {
        *self.status.read()
    }

    /// Overwrites the cached state.
    ///
    /// Used by the repository after a failed remote call, so later writes
    /// take the local path without burning a round-trip each, and by tests
    /// to pin the engine into a known state.
    pub fn force(&self, state: ConnState) {
        self.record(state);
    }

    fn record(&self, state: ConnState) {
        let mut status = self.status.write();
        if status.state != state {
            info!(from = ?status.state, to = ?state, "connectivity changed");
        }
        status.state = state;
        status.checked_at = Some(SystemTime::now());
    }
}
