//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use storelink_core::{ContextRole, StateValue, StoreName};
use storelink_store::{LocalStore, StoreRegistry};
use storelink_sync::{MemoryChannel, MemoryNetwork, SyncConfig};

/// The state every fixture store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub count: u64,
}

impl Counter {
    pub fn new(count: u64) -> Self {
        Self { count }
    }

    /// Encode as a state value.
    pub fn state(self) -> StateValue {
        // A struct of one integer always encodes.
        StateValue::encode(&self).unwrap_or_default()
    }

    /// Decode from a state value, if it is a counter.
    pub fn from_state(state: &StateValue) -> Option<Self> {
        state.decode().ok()
    }
}

/// A network with a background context and one panel context.
pub struct TestNetwork {
    pub network: Arc<MemoryNetwork>,
    pub background: Arc<MemoryChannel>,
    pub panel: Arc<MemoryChannel>,
}

impl TestNetwork {
    /// Connect a background and a panel.
    pub async fn new() -> Self {
        let network = MemoryNetwork::new();
        let background = Arc::new(network.connect_new(ContextRole::Background).await);
        let panel = Arc::new(network.connect_new(ContextRole::Panel).await);
        Self {
            network,
            background,
            panel,
        }
    }

    /// Connect another context.
    pub async fn add(&self, role: ContextRole) -> Arc<MemoryChannel> {
        Arc::new(self.network.connect_new(role).await)
    }
}

/// A registry with one counter store at zero per name.
pub fn counter_registry(stores: &[StoreName]) -> Arc<StoreRegistry> {
    let registry = Arc::new(StoreRegistry::new());
    for name in stores {
        // Names may repeat in a caller's list; the first one wins.
        let _ = registry.register(LocalStore::new(*name, Counter::new(0).state()));
    }
    registry
}

/// Sync config with a short request timeout, so failure paths finish fast.
pub fn fast_config() -> SyncConfig {
    SyncConfig::default().with_request_timeout(Duration::from_millis(300))
}

/// Route tracing output to the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use storelink_store::StoreLike;
    use storelink_sync::Channel;

    #[test]
    fn test_counter_state() {
        let state = Counter::new(7).state();
        assert_eq!(Counter::from_state(&state), Some(Counter::new(7)));
        assert_eq!(Counter::from_state(&StateValue::null()), None);
    }

    #[test]
    fn test_counter_registry() {
        let registry = counter_registry(&[StoreName::Tab, StoreName::Command, StoreName::Tab]);
        assert_eq!(registry.len(), 2);

        let tab = registry.get(StoreName::Tab).unwrap();
        assert_eq!(Counter::from_state(&tab.state().unwrap()), Some(Counter::new(0)));
    }

    #[tokio::test]
    async fn test_network() {
        let net = TestNetwork::new().await;
        let popup = net.add(ContextRole::Popup).await;

        let others = net.background.connected_contexts().await.unwrap();
        assert_eq!(others.len(), 2);
        assert!(others.contains(&(popup.local_context_id(), ContextRole::Popup)));
    }
}
