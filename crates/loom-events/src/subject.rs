// SPDX-License-Identifier: MIT
use tokio::sync::broadcast;

use crate::event::TaskEvent;

/// Default channel capacity: generous enough that a slow subscriber falling
/// a few events behind a fast-producing task does not get disconnected.
const DEFAULT_CAPACITY: usize = 256;

/// Multicast emitter for a single in-flight task's events.
///
/// Exclusively owned by the task that created it (per the engine's
/// single-task contract); closed when the task completes or errors, which
/// drops all subscribers' receivers into the lagged/closed state. Cloning an
/// `EventSubject` shares the same underlying channel — cheap, and the
/// expected way to hand the same subject to several interceptors.
#[derive(Clone)]
pub struct EventSubject {
    tx: broadcast::Sender<TaskEvent>,
}

impl EventSubject {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to future events. Events emitted before this call are not
    /// replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all current subscribers. A send with no subscribers
    /// is not an error — the task may be running unobserved.
    pub fn emit(&self, event: TaskEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventSubject {
    fn default() -> Self {
        Self::new()
    }
}
