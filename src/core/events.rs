// src/core/events.rs

//! The event bus that decouples Raft FSM application from side effects.
//!
//! FSM apply must not perform I/O other than updating its own structures;
//! side effects are driven by listeners that observe applied commands.
//! This module is that listener fan-out:
//! the Raft apply loop publishes an `AppliedCommand` after every commit,
//! and independent subsystems (the backup runner dispatcher, usage-stat
//! pollers, audit logging) subscribe without the FSM knowing they exist.

use crate::core::cluster::commands::ClusterCommand;
use tokio::sync::broadcast;
use tracing::warn;

/// A command that has been committed and applied to the FSM on this node.
#[derive(Debug, Clone)]
pub struct AppliedCommand {
    pub command: ClusterCommand,
    pub index: u64,
}

/// Broadcasts applied commands to any number of subscribers.
///
/// A `broadcast` channel (not `mpsc`) because every subscriber must see
/// every applied command independently — e.g. the backup dispatcher reacts
/// to `BackupEventStart` while the audit logger reacts to everything.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppliedCommand>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppliedCommand> {
        self.tx.subscribe()
    }

    /// Publishes an applied command. Lag (a slow subscriber falling behind
    /// the bounded channel) is logged and dropped rather than propagated —
    /// a missed event here means a subsystem re-derives its state from the
    /// FSM snapshot on its next tick rather than the crate crashing.
    pub fn publish(&self, command: ClusterCommand, index: u64) {
        if self.tx.send(AppliedCommand { command, index }).is_err() {
            // No subscribers currently listening; not an error.
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Drains a receiver into the given handler until the bus is closed,
/// logging (not propagating) receiver lag so one slow consumer can't wedge
/// the whole process.
pub async fn run_listener<F>(mut rx: broadcast::Receiver<AppliedCommand>, mut handle: F)
where
    F: FnMut(AppliedCommand),
{
    loop {
        match rx.recv().await {
            Ok(event) => handle(event),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("event bus listener lagged by {n} messages, continuing");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
