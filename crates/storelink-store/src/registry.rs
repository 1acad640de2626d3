//! Explicit registry of local stores.
//!
//! The registry is a plain value handed to whoever needs it, so two
//! independent sessions (or two tests) never share stores by accident.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use storelink_core::StoreName;

use crate::error::{Result, StoreError};
use crate::local::LocalStore;
use crate::traits::StoreLike;

/// Callback run after a store joins a registry.
pub type RegistrationHook = Arc<dyn Fn(&Arc<LocalStore>) + Send + Sync>;

/// Handle returned by [`StoreRegistry::on_register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(pub u64);

/// Local stores of one owning context, keyed by name.
#[derive(Default)]
pub struct StoreRegistry {
    stores: RwLock<BTreeMap<StoreName, Arc<LocalStore>>>,
    next_hook: AtomicU64,
    hooks: Mutex<Vec<(HookId, RegistrationHook)>>,
}

impl StoreRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a store. Names are unique per registry.
    pub fn register(&self, store: LocalStore) -> Result<Arc<LocalStore>> {
        self.register_shared(Arc::new(store))
    }

    /// Register a store that is already shared.
    ///
    /// Registration hooks run after the store is visible through
    /// [`get`](Self::get), outside the registry lock.
    pub fn register_shared(&self, store: Arc<LocalStore>) -> Result<Arc<LocalStore>> {
        let name = store.id();
        {
            let mut stores = self.stores.write();
            if stores.contains_key(&name) {
                return Err(StoreError::DuplicateStore(name));
            }
            stores.insert(name, Arc::clone(&store));
        }
        tracing::debug!(store = %name, "store registered");

        let hooks: Vec<RegistrationHook> = self
            .hooks
            .lock()
            .iter()
            .map(|(_, hook)| Arc::clone(hook))
            .collect();
        for hook in hooks {
            hook(&store);
        }
        Ok(store)
    }

    /// Run `hook` for every store registered from now on.
    ///
    /// Stores already present are not replayed; callers that need them
    /// install the hook first and then walk [`stores`](Self::stores).
    pub fn on_register(&self, hook: RegistrationHook) -> HookId {
        let id = HookId(self.next_hook.fetch_add(1, Ordering::Relaxed));
        self.hooks.lock().push((id, hook));
        id
    }

    /// Remove a registration hook. Returns false if it was already gone.
    pub fn remove_hook(&self, id: HookId) -> bool {
        let mut hooks = self.hooks.lock();
        match hooks.iter().position(|(existing, _)| *existing == id) {
            Some(index) => {
                hooks.remove(index);
                true
            }
            None => false,
        }
    }

    /// Look up a store by name.
    pub fn get(&self, name: StoreName) -> Option<Arc<LocalStore>> {
        self.stores.read().get(&name).cloned()
    }

    /// Look up a store, failing if it is missing.
    pub fn require(&self, name: StoreName) -> Result<Arc<LocalStore>> {
        self.get(name).ok_or(StoreError::NotFound(name))
    }

    /// Registered names in code order.
    pub fn names(&self) -> Vec<StoreName> {
        self.stores.read().keys().copied().collect()
    }

    /// All registered stores in code order.
    pub fn stores(&self) -> Vec<Arc<LocalStore>> {
        self.stores.read().values().cloned().collect()
    }

    /// Number of registered stores.
    pub fn len(&self) -> usize {
        self.stores.read().len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.stores.read().is_empty()
    }
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("stores", &self.names())
            .finish()
    }
}
