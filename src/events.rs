//! Lifecycle notification fan-out.
//!
//! Observers subscribe through an unbounded channel; every emitted event is
//! cloned to each live subscriber. Receivers that have been dropped are pruned
//! on the next emit.

use std::sync::Mutex;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::track::Track;

/// Notifications observable while the engine runs.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A row was inserted or overwritten.
    Added(Track),
    /// Rows were deleted. Carries a single file path, or the directory path
    /// when an entire subtree was dropped at once.
    Removed(String),
    /// The synced flag was written. Emitted on every write, including ones
    /// that do not change the value; observers care about transitions.
    Synced(bool),
    /// The initial full pass finished and the watcher is attached.
    Ready,
    /// A surfaced failure, already logged. The engine stays usable.
    Error(String),
}

#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<UnboundedSender<SyncEvent>>>,
}

impl EventBus {
    pub fn subscribe(&self) -> UnboundedReceiver<SyncEvent> {
        let (tx, rx) = unbounded_channel();
        self.lock().push(tx);
        rx
    }

    pub fn emit(&self, event: SyncEvent) {
        self.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<UnboundedSender<SyncEvent>>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_subscribers_receive_each_event() {
        let bus = EventBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.emit(SyncEvent::Ready);

        assert!(matches!(a.try_recv(), Ok(SyncEvent::Ready)));
        assert!(matches!(b.try_recv(), Ok(SyncEvent::Ready)));
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = EventBus::default();
        let rx = bus.subscribe();
        drop(rx);

        bus.emit(SyncEvent::Synced(true));
        assert!(bus.lock().is_empty());
    }
}
