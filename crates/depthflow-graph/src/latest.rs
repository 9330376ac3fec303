//! Single-slot handoff from an acquisition thread to a source node.
//!
//! The producer overwrites; the consumer takes whatever is newest. A frame
//! that is overwritten before it is taken is counted as dropped. Neither
//! side ever blocks on the other for longer than a slot swap.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

struct Shared<T> {
    slot: Mutex<Option<T>>,
    sent: AtomicU64,
    dropped: AtomicU64,
}

/// Producer half of a [`latest`] channel.
pub struct LatestSender<T> {
    shared: Arc<Shared<T>>,
}

/// Consumer half of a [`latest`] channel.
pub struct LatestReceiver<T> {
    shared: Arc<Shared<T>>,
}

/// Creates a latest-value channel.
pub fn latest<T>() -> (LatestSender<T>, LatestReceiver<T>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(None),
        sent: AtomicU64::new(0),
        dropped: AtomicU64::new(0),
    });
    (
        LatestSender {
            shared: Arc::clone(&shared),
        },
        LatestReceiver { shared },
    )
}

impl<T> LatestSender<T> {
    /// Publishes `value`, replacing any value not yet taken.
    pub fn send(&self, value: T) {
        let previous = self.shared.slot.lock().replace(value);
        self.shared.sent.fetch_add(1, Ordering::Relaxed);
        if previous.is_some() {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Returns true once the receiver has been dropped.
    pub fn is_closed(&self) -> bool {
        Arc::strong_count(&self.shared) == 1
    }
}

impl<T> LatestReceiver<T> {
    /// Takes the newest value, if one arrived since the last take.
    pub fn take(&self) -> Option<T> {
        self.shared.slot.lock().take()
    }

    /// Values published so far.
    pub fn sent(&self) -> u64 {
        self.shared.sent.load(Ordering::Relaxed)
    }

    /// Values overwritten before they were taken.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}
