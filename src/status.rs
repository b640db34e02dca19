//! Readiness and sync-state bookkeeping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::events::{EventBus, SyncEvent};

/// Tracks the two observable flags of a sync instance.
///
/// `ready` means the initial full pass completed and the watcher is attached.
/// `synced` means no reconciliation work is currently in flight. Both start
/// false and return to false on close.
pub struct StatusTracker {
    ready: AtomicBool,
    synced: AtomicBool,
    bus: Arc<EventBus>,
}

impl StatusTracker {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            ready: AtomicBool::new(false),
            synced: AtomicBool::new(false),
            bus,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Relaxed)
    }

    pub(crate) fn set_ready(&self, value: bool) {
        self.ready.store(value, Ordering::Relaxed);
    }

    /// Write the synced flag and notify observers.
    ///
    /// Emits on every call, even when the stored value does not change:
    /// overlapping passes produce redundant transitions and observers are told
    /// about each one.
    pub(crate) fn set_synced(&self, value: bool) {
        self.synced.store(value, Ordering::Relaxed);
        self.bus.emit(SyncEvent::Synced(value));
    }

    /// Clear both flags without emitting; used on close.
    pub(crate) fn reset(&self) {
        self.ready.store(false, Ordering::Relaxed);
        self.synced.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redundant_synced_writes_still_emit() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let status = StatusTracker::new(Arc::clone(&bus));

        status.set_synced(true);
        status.set_synced(true);

        assert!(matches!(rx.try_recv(), Ok(SyncEvent::Synced(true))));
        assert!(matches!(rx.try_recv(), Ok(SyncEvent::Synced(true))));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn reset_clears_flags_silently() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let status = StatusTracker::new(Arc::clone(&bus));

        status.set_ready(true);
        status.set_synced(true);
        let _ = rx.try_recv();

        status.reset();
        assert!(!status.is_ready());
        assert!(!status.is_synced());
        assert!(rx.try_recv().is_err());
    }
}
