//! Event sink: a notification side-channel for operators.
//!
//! The sink records human-readable events (operation queued, replay
//! succeeded or failed) for the operational dashboard. It never affects
//! control flow and recording never fails.

use crate::entity::now_millis;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};

/// Severity of a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Routine activity.
    Info,
    /// Degraded but expected behavior (e.g. a replay that will be retried).
    Warning,
    /// Something an operator should look at (e.g. a rejected replay).
    Error,
}

/// A single recorded event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// Record time, milliseconds since the Unix epoch.
    pub at: i64,
    /// Short title.
    pub title: String,
    /// Human-readable description.
    pub message: String,
    /// Severity.
    pub severity: Severity,
}

/// Append-only, bounded event history with optional live subscribers.
pub struct EventSink {
    history: RwLock<VecDeque<EventRecord>>,
    subscribers: RwLock<Vec<Sender<EventRecord>>>,
    retention: usize,
}

impl EventSink {
    /// Creates a sink with the default retention (1000 records).
    #[must_use]
    pub fn new() -> Self {
        Self::with_retention(1000)
    }

    /// Creates a sink keeping at most `retention` records; the oldest are
    /// dropped first.
    #[must_use]
    pub fn with_retention(retention: usize) -> Self {
        Self {
            history: RwLock::new(VecDeque::new()),
            subscribers: RwLock::new(Vec::new()),
            retention,
        }
    }

    /// Records an event.
    pub fn record(&self, title: impl Into<String>, message: impl Into<String>, severity: Severity) {
        let event = EventRecord {
            at: now_millis(),
            title: title.into(),
            message: message.into(),
            severity,
        };

        {
            let mut history = self.history.write();
            history.push_back(event.clone());
            while history.len() > self.retention {
                history.pop_front();
            }
        }

        // Prune disconnected subscribers as we go
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Returns up to `limit` of the most recent events, newest last.
    pub fn recent(&self, limit: usize) -> Vec<EventRecord> {
        let history = self.history.read();
        history
            .iter()
            .skip(history.len().saturating_sub(limit))
            .cloned()
            .collect()
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.history.read().len()
    }

    /// Returns true if no events are retained.
    pub fn is_empty(&self) -> bool {
        self.history.read().is_empty()
    }

    /// Subscribes to future events.
    pub fn subscribe(&self) -> Receiver<EventRecord> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}
