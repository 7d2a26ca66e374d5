//! Background driver: periodic probe-and-drain on a dedicated thread.

use crate::engine::SyncEngine;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

struct Shared {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Runs [`SyncEngine::tick`] on a background thread at the configured
/// probe interval.
///
/// Stops promptly on [`stop`](SyncDriver::stop) or drop; the interval wait
/// is interruptible, so shutdown never blocks for a full period. Tick
/// failures are logged and do not stop the driver.
pub struct SyncDriver {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl SyncDriver {
    /// Starts the driver. The first tick runs immediately, resolving the
    /// engine's initial connectivity state.
    pub fn start(engine: SyncEngine) -> Self {
        let shared = Arc::new(Shared {
            stopped: Mutex::new(false),
            wake: Condvar::new(),
        });
        let thread_shared = Arc::clone(&shared);
        let interval = engine.config().probe_interval;

        let handle = thread::spawn(move || {
            debug!(?interval, "sync driver started");
            loop {
                match engine.tick() {
                    Ok(report) if report.succeeded > 0 || report.failed > 0 => {
                        debug!(
                            succeeded = report.succeeded,
                            failed = report.failed,
                            "background drain finished"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "background tick failed"),
                }

                let mut stopped = thread_shared.stopped.lock();
                if *stopped {
                    break;
                }
                thread_shared.wake.wait_for(&mut stopped, interval);
                if *stopped {
                    break;
                }
            }
            debug!("sync driver stopped");
        });

        Self {
            shared,
            handle: Some(handle),
        }
    }

    /// Stops the driver and waits for the background thread to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        *self.shared.stopped.lock() = true;
        self.shared.wake.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SyncDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}
