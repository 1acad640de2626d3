//! Change listeners.
//!
//! A listener is a "dirty" signal: it carries no payload. Registrations are
//! additive and never deduplicated; the same closure registered twice runs
//! twice per change.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// A change callback.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by a registration, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Ordered set of listeners.
pub struct ListenerSet {
    next_id: AtomicU64,
    entries: Mutex<Vec<(ListenerId, Listener)>>,
}

impl ListenerSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Register a listener at the end of the invocation order.
    pub fn add(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().push((id, listener));
        id
    }

    /// Remove a registration. Returns false if it was already gone.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock();
        match entries.iter().position(|(existing, _)| *existing == id) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Invoke every listener in registration order.
    ///
    /// The set is snapshotted first, so a listener may register or remove
    /// listeners (or read the store) without deadlocking. Changes made
    /// during a fan-out take effect from the next one.
    pub fn notify(&self) {
        let snapshot: Vec<Listener> = self
            .entries
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            listener();
        }
    }
}

impl Default for ListenerSet {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.len())
            .finish()
    }
}
