//! Owner side of the protocol.
//!
//! The owning context answers state requests with full snapshots
//! ([`Responder`]) and pushes a change notification after every mutation
//! of a registered store ([`ChangeBroadcaster`]).

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use storelink_core::{ContextId, DestinationSelector, StoreName};
use storelink_store::{HookId, ListenerId, LocalStore, StoreLike, StoreRegistry};

use crate::dispatcher::Dispatcher;
use crate::error::{Result, SyncError};
use crate::messages::{Envelope, MessageType};
use crate::transport::{Channel, DeliveryReport};

/// Answers state requests from the registry.
pub struct Responder<C: Channel> {
    registry: Arc<StoreRegistry>,
    dispatcher: Arc<Dispatcher<C>>,
}

impl<C: Channel> Responder<C> {
    /// Create a responder for a registry.
    pub fn new(registry: Arc<StoreRegistry>, dispatcher: Arc<Dispatcher<C>>) -> Self {
        Self {
            registry,
            dispatcher,
        }
    }

    /// Reply to a state request with the store's full snapshot.
    ///
    /// The response goes back to the requesting context only and carries
    /// the request's token and the store's current version.
    pub async fn handle_request(&self, from: ContextId, envelope: &Envelope) -> Result<DeliveryReport> {
        if envelope.message_type != MessageType::StateRequest {
            return Err(SyncError::InvalidMessage(format!(
                "expected state-request, got {}",
                envelope.message_type
            )));
        }
        let token = envelope
            .token
            .ok_or_else(|| SyncError::InvalidMessage("state request without token".into()))?;
        let store = self
            .registry
            .get(envelope.store)
            .ok_or(SyncError::UnknownStoreId(envelope.store))?;

        let (state, version) = store.snapshot();
        let response = Envelope::state_response(envelope.store, token, state, version);
        self.dispatcher
            .dispatch(&DestinationSelector::Context(from), &response)
            .await
    }
}

/// Pushes change notifications for every registered store.
///
/// Store listeners run synchronously inside the mutation; they only enqueue
/// `(store, version)` on an unbounded queue. A single pump task drains the
/// queue in order, so notifications for one store leave in mutation order.
/// Stores registered after [`start`](Self::start) are picked up through a
/// registry hook.
pub struct ChangeBroadcaster {
    registry: Weak<StoreRegistry>,
    hook: Option<HookId>,
    watcher: Arc<Watcher>,
    pump: JoinHandle<()>,
}

/// Listener bookkeeping shared with the registry hook.
struct Watcher {
    tx: mpsc::UnboundedSender<(StoreName, u64)>,
    subscriptions: Mutex<BTreeMap<StoreName, (Weak<LocalStore>, ListenerId)>>,
}

impl Watcher {
    /// Subscribe to a store once; repeated calls for one name are no-ops.
    fn watch(&self, store: &Arc<LocalStore>) {
        let name = store.id();
        let mut subscriptions = self.subscriptions.lock();
        if subscriptions.contains_key(&name) {
            return;
        }

        let weak = Arc::downgrade(store);
        let listener_store = Weak::clone(&weak);
        let tx = self.tx.clone();
        let id = store.add_changed_listener(Arc::new(move || {
            if let Some(store) = listener_store.upgrade() {
                // Send only fails after shutdown; nothing left to notify.
                let _ = tx.send((name, store.notifying_version()));
            }
        }));
        subscriptions.insert(name, (weak, id));
        tracing::debug!(store = %name, "watching store for changes");
    }
}

impl ChangeBroadcaster {
    /// Subscribe to every store in the registry, now and later, and start
    /// pumping.
    pub fn start<C: Channel + 'static>(
        registry: &Arc<StoreRegistry>,
        dispatcher: Arc<Dispatcher<C>>,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<(StoreName, u64)>();
        let watcher = Arc::new(Watcher {
            tx,
            subscriptions: Mutex::new(BTreeMap::new()),
        });

        // Hook first so a store registered concurrently is not missed;
        // `watch` ignores the one it may then see twice.
        let hooked = Arc::downgrade(&watcher);
        let hook = registry.on_register(Arc::new(move |store: &Arc<LocalStore>| {
            if let Some(watcher) = hooked.upgrade() {
                watcher.watch(store);
            }
        }));
        for store in registry.stores() {
            watcher.watch(&store);
        }

        let destination = dispatcher.config().notify_destination.clone();
        let pump = tokio::spawn(async move {
            while let Some((store, version)) = rx.recv().await {
                let envelope = Envelope::change_notification(store, version);
                if let Err(e) = dispatcher.dispatch(&destination, &envelope).await {
                    tracing::warn!(
                        store = %store,
                        version,
                        error = %e,
                        "change notification not sent"
                    );
                }
            }
        });

        Self {
            registry: Arc::downgrade(registry),
            hook: Some(hook),
            watcher,
            pump,
        }
    }

    /// Number of stores being watched.
    pub fn watched(&self) -> usize {
        self.watcher.subscriptions.lock().len()
    }

    /// Unsubscribe from every store and stop the pump.
    pub fn shutdown(&mut self) {
        if let (Some(hook), Some(registry)) = (self.hook.take(), self.registry.upgrade()) {
            registry.remove_hook(hook);
        }
        let subscriptions = std::mem::take(&mut *self.watcher.subscriptions.lock());
        for (store, id) in subscriptions.into_values() {
            if let Some(store) = store.upgrade() {
                store.remove_changed_listener(id);
            }
        }
        self.pump.abort();
    }
}

impl Drop for ChangeBroadcaster {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_envelope;
    use crate::config::SyncConfig;
    use crate::messages::CorrelationToken;
    use crate::transport::memory::{MemoryChannel, MemoryNetwork};
    use serde_json::json;
    use std::time::Duration;
    use storelink_core::{ContextRole, StateValue};

    struct Setup {
        registry: Arc<StoreRegistry>,
        dispatcher: Arc<Dispatcher<MemoryChannel>>,
        panel: MemoryChannel,
        tab: Arc<LocalStore>,
    }

    async fn setup() -> Setup {
        let network = MemoryNetwork::new();
        let background = network.connect_new(ContextRole::Background).await;
        let panel = network.connect_new(ContextRole::Panel).await;

        let registry = Arc::new(StoreRegistry::new());
        let tab = registry
            .register(LocalStore::with_state(StoreName::Tab, &json!({ "count": 0 })).unwrap())
            .unwrap();

        let dispatcher = Arc::new(Dispatcher::new(Arc::new(background), SyncConfig::default()));
        Setup {
            registry,
            dispatcher,
            panel,
            tab,
        }
    }

    #[tokio::test]
    async fn test_responder_replies_to_requester() {
        let s = setup().await;
        let responder = Responder::new(Arc::clone(&s.registry), Arc::clone(&s.dispatcher));

        let request = Envelope::state_request(StoreName::Tab, CorrelationToken(11));
        let report = responder
            .handle_request(s.panel.local_context_id(), &request)
            .await
            .unwrap();
        assert_eq!(report.delivered, vec![s.panel.local_context_id()]);

        let (_, bytes) = s.panel.recv().await.unwrap();
        let response = decode_envelope(&bytes).unwrap();
        assert_eq!(response.message_type, MessageType::StateResponse);
        assert_eq!(response.token, Some(CorrelationToken(11)));
        assert_eq!(response.version, Some(0));
        assert_eq!(
            response.payload.unwrap().decode::<serde_json::Value>().unwrap(),
            json!({ "count": 0 })
        );
    }

    #[tokio::test]
    async fn test_responder_unknown_store() {
        let s = setup().await;
        let responder = Responder::new(Arc::clone(&s.registry), Arc::clone(&s.dispatcher));

        let request = Envelope::state_request(StoreName::Assessment, CorrelationToken(1));
        let err = responder
            .handle_request(s.panel.local_context_id(), &request)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::UnknownStoreId(StoreName::Assessment)));
    }

    #[tokio::test]
    async fn test_broadcaster_pushes_in_mutation_order() {
        let s = setup().await;
        let _broadcaster = ChangeBroadcaster::start(&s.registry, Arc::clone(&s.dispatcher));

        for count in 1..=5 {
            s.tab.set_from(&json!({ "count": count })).unwrap();
        }

        let mut versions = Vec::new();
        for _ in 0..5 {
            let (_, bytes) = s.panel.recv().await.unwrap();
            let envelope = decode_envelope(&bytes).unwrap();
            assert_eq!(envelope.message_type, MessageType::ChangeNotification);
            assert_eq!(envelope.payload, None);
            versions.push(envelope.version.unwrap());
        }
        assert_eq!(versions, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_broadcaster_carries_triggering_version() {
        let s = setup().await;
        {
            let mutator = Arc::downgrade(&s.tab);
            s.tab.add_changed_listener(Arc::new(move || {
                if let Some(tab) = mutator.upgrade() {
                    if tab.notifying_version() == 1 {
                        tab.set_from(&json!({ "count": 2 })).unwrap();
                    }
                }
            }));
        }
        let _broadcaster = ChangeBroadcaster::start(&s.registry, Arc::clone(&s.dispatcher));

        s.tab.set_from(&json!({ "count": 1 })).unwrap();

        let mut versions = Vec::new();
        for _ in 0..2 {
            let (_, bytes) = s.panel.recv().await.unwrap();
            versions.push(decode_envelope(&bytes).unwrap().version.unwrap());
        }
        assert_eq!(versions, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_broadcaster_watches_later_registrations() {
        let s = setup().await;
        let broadcaster = ChangeBroadcaster::start(&s.registry, Arc::clone(&s.dispatcher));
        assert_eq!(broadcaster.watched(), 1);

        let command = s
            .registry
            .register(LocalStore::with_state(StoreName::Command, &json!({ "count": 0 })).unwrap())
            .unwrap();
        assert_eq!(broadcaster.watched(), 2);
        assert_eq!(command.listener_count(), 1);

        command.set_from(&json!({ "count": 7 })).unwrap();
        let (_, bytes) = s.panel.recv().await.unwrap();
        let envelope = decode_envelope(&bytes).unwrap();
        assert_eq!(envelope.message_type, MessageType::ChangeNotification);
        assert_eq!(envelope.store, StoreName::Command);
        assert_eq!(envelope.version, Some(1));
    }

    #[tokio::test]
    async fn test_broadcaster_shutdown_unsubscribes() {
        let s = setup().await;
        let mut broadcaster = ChangeBroadcaster::start(&s.registry, Arc::clone(&s.dispatcher));
        assert_eq!(broadcaster.watched(), 1);
        assert_eq!(s.tab.listener_count(), 1);

        broadcaster.shutdown();
        assert_eq!(s.tab.listener_count(), 0);
        assert_eq!(broadcaster.watched(), 0);

        // Registrations after shutdown are not watched either.
        let command = s
            .registry
            .register(LocalStore::new(StoreName::Command, StateValue::null()))
            .unwrap();
        assert_eq!(command.listener_count(), 0);

        s.tab.set_state(StateValue::null());
        let nothing = s
            .panel
            .recv_timeout(Duration::from_millis(30))
            .await
            .unwrap();
        assert!(nothing.is_none());
    }
}
