//! Local, authoritative stores.
//!
//! A [`LocalStore`] is created once by its owning context and lives as long
//! as that context. Only the owner mutates it; other contexts see it through
//! proxies.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{ReentrantMutex, RwLock};
use serde::Serialize;
use storelink_core::{StateValue, StoreName};

use crate::error::Result;
use crate::listeners::{Listener, ListenerId, ListenerSet};
use crate::traits::StoreLike;

/// Authoritative store for one named domain.
pub struct LocalStore {
    name: StoreName,
    inner: RwLock<Snapshot>,
    listeners: ListenerSet,
    /// Serializes mutation + fan-out. Re-entrant so a listener may mutate
    /// the store it is listening to.
    fan_out: ReentrantMutex<FanOut>,
    /// Version whose listeners are currently (or were last) invoked.
    notifying: AtomicU64,
}

struct Snapshot {
    state: StateValue,
    version: u64,
}

/// Fan-out bookkeeping, only touched while `fan_out` is held.
struct FanOut {
    /// Versions whose listeners have not been invoked yet, oldest first.
    pending: RefCell<VecDeque<u64>>,
    /// A fan-out loop is running further up this thread's stack.
    draining: Cell<bool>,
}

/// Marks a fan-out loop as running. Dropping it, including while a
/// listener panic unwinds, lets the next mutation start a fresh loop.
struct Draining<'a>(&'a FanOut);

impl<'a> Draining<'a> {
    fn begin(fan_out: &'a FanOut) -> Self {
        fan_out.draining.set(true);
        Self(fan_out)
    }
}

impl Drop for Draining<'_> {
    fn drop(&mut self) {
        self.0.draining.set(false);
        self.0.pending.borrow_mut().clear();
    }
}

impl LocalStore {
    /// Create a store with an initial state at version 0.
    pub fn new(name: StoreName, initial: StateValue) -> Self {
        Self {
            name,
            inner: RwLock::new(Snapshot {
                state: initial,
                version: 0,
            }),
            listeners: ListenerSet::new(),
            fan_out: ReentrantMutex::new(FanOut {
                pending: RefCell::new(VecDeque::new()),
                draining: Cell::new(false),
            }),
            notifying: AtomicU64::new(0),
        }
    }

    /// Create a store from any serializable initial state.
    pub fn with_state<T: Serialize + ?Sized>(name: StoreName, initial: &T) -> Result<Self> {
        Ok(Self::new(name, StateValue::encode(initial)?))
    }

    /// Current mutation counter. Starts at 0, +1 per mutation.
    pub fn version(&self) -> u64 {
        self.inner.read().version
    }

    /// Version of the mutation whose listeners are running.
    ///
    /// Inside a listener this is the version that triggered the call, even
    /// if a re-entrant mutation has already moved [`version`](Self::version)
    /// on. Outside a fan-out it is the last version whose listeners ran.
    pub fn notifying_version(&self) -> u64 {
        self.notifying.load(Ordering::Acquire)
    }

    /// State and version read together.
    pub fn snapshot(&self) -> (StateValue, u64) {
        let inner = self.inner.read();
        (inner.state.clone(), inner.version)
    }

    /// Replace the state and notify listeners. Returns the new version.
    ///
    /// A panicking listener propagates to the caller. The mutation stays
    /// applied, the remaining listeners of that change are skipped, and
    /// later mutations notify as usual.
    pub fn set_state(&self, state: StateValue) -> u64 {
        let guard = self.fan_out.lock();

        let version = {
            let mut inner = self.inner.write();
            inner.state = state;
            inner.version += 1;
            inner.version
        };
        tracing::trace!(store = %self.name, version, "store mutated");

        guard.pending.borrow_mut().push_back(version);
        if guard.draining.get() {
            // A listener mutated us; the loop below on the outer frame
            // delivers this once the current fan-out has finished.
            return version;
        }

        let _draining = Draining::begin(&guard);
        loop {
            let Some(next) = guard.pending.borrow_mut().pop_front() else {
                break;
            };
            self.notifying.store(next, Ordering::Release);
            self.listeners.notify();
        }

        version
    }

    /// Replace the state from any serializable value.
    pub fn set_from<T: Serialize + ?Sized>(&self, value: &T) -> Result<u64> {
        let state = StateValue::encode(value)?;
        Ok(self.set_state(state))
    }

    /// Modify the state in place and notify listeners.
    ///
    /// The closure sees the latest state; no other mutation can interleave
    /// between the read and the write.
    pub fn update<F>(&self, f: F) -> u64
    where
        F: FnOnce(&mut StateValue),
    {
        let _guard = self.fan_out.lock();
        let mut next = self.inner.read().state.clone();
        f(&mut next);
        self.set_state(next)
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl StoreLike for LocalStore {
    fn id(&self) -> StoreName {
        self.name
    }

    fn state(&self) -> Option<StateValue> {
        Some(self.inner.read().state.clone())
    }

    fn add_changed_listener(&self, listener: Listener) -> ListenerId {
        self.listeners.add(listener)
    }

    fn remove_changed_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("name", &self.name)
            .field("version", &self.version())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
