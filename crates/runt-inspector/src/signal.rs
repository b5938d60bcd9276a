//! Typed pub-sub signals with explicit unsubscribe tokens.
//!
//! Every component that connects to a signal keeps the returned [`SlotId`]
//! and disconnects it when it lets go of the sender (rebinding, disposal).
//! Emission snapshots the slot list first, so a slot may disconnect itself or
//! others while the signal is being emitted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

/// Token returned by [`Signal::connect`], used to disconnect the slot again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(u64);

type Slot<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Process-wide counter so a token can never match a slot of another signal.
static NEXT_SLOT: AtomicU64 = AtomicU64::new(1);

pub struct Signal<T> {
    slots: StdMutex<Vec<(SlotId, Slot<T>)>>,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self {
            slots: StdMutex::new(Vec::new()),
        }
    }

    /// Register a slot. It stays connected until [`Signal::disconnect`] or
    /// [`Signal::clear`] is called.
    pub fn connect<F>(&self, slot: F) -> SlotId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SlotId(NEXT_SLOT.fetch_add(1, Ordering::Relaxed));
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(slot)));
        id
    }

    /// Remove a slot. Returns false if it was not connected to this signal.
    pub fn disconnect(&self, id: SlotId) -> bool {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let before = slots.len();
        slots.retain(|(slot_id, _)| *slot_id != id);
        slots.len() != before
    }

    /// Drop every connected slot.
    pub fn clear(&self) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn slot_count(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Call every slot connected at the time of the call, in connection order.
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<Slot<T>> = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, slot)| slot.clone())
            .collect();
        for slot in snapshot {
            slot(value);
        }
    }
}
