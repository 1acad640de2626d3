//! Store action message creators.
//!
//! A creator is bound to one proxy. It knows how to ask the owner for that
//! store's snapshot and how to apply the answer. The factory builds one
//! creator per proxy; [`StoreActionMessageCreators::get_all_states`] fans
//! out every request at once.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::task::JoinSet;

use storelink_core::{DestinationSelector, StoreName};
use storelink_store::StoreLike;

use crate::dispatcher::Dispatcher;
use crate::error::{Result, SyncError};
use crate::proxy::{ApplyOutcome, StoreProxy};
use crate::transport::Channel;

/// Builds and applies state requests for one store.
pub struct StoreActionMessageCreator<C: Channel> {
    proxy: Arc<StoreProxy>,
    dispatcher: Arc<Dispatcher<C>>,
    destination: DestinationSelector,
}

impl<C: Channel> Clone for StoreActionMessageCreator<C> {
    fn clone(&self) -> Self {
        Self {
            proxy: Arc::clone(&self.proxy),
            dispatcher: Arc::clone(&self.dispatcher),
            destination: self.destination.clone(),
        }
    }
}

impl<C: Channel> StoreActionMessageCreator<C> {
    /// The store this creator requests.
    pub fn store(&self) -> StoreName {
        self.proxy.id()
    }

    /// The proxy responses are applied to.
    pub fn proxy(&self) -> &Arc<StoreProxy> {
        &self.proxy
    }

    /// Request the current snapshot and apply it to the proxy.
    ///
    /// On failure the proxy keeps whatever it had before.
    pub async fn get_state(&self) -> Result<ApplyOutcome> {
        let response = self
            .dispatcher
            .request(&self.destination, self.store())
            .await?;
        self.proxy.apply_incoming(&response)
    }
}

/// Builds creators bound to one dispatcher and owner destination.
pub struct StoreActionMessageCreatorFactory<C: Channel> {
    dispatcher: Arc<Dispatcher<C>>,
    destination: DestinationSelector,
}

impl<C: Channel> StoreActionMessageCreatorFactory<C> {
    /// Create a factory that sends to the configured owner destination.
    pub fn new(dispatcher: Arc<Dispatcher<C>>) -> Self {
        let destination = dispatcher.config().owner_destination.clone();
        Self {
            dispatcher,
            destination,
        }
    }

    /// Override where requests are sent.
    pub fn with_destination(mut self, destination: DestinationSelector) -> Self {
        self.destination = destination;
        self
    }

    /// One creator per proxy, keyed by store name.
    ///
    /// If two proxies share a name the later one wins.
    pub fn from_stores(&self, proxies: &[Arc<StoreProxy>]) -> StoreActionMessageCreators<C> {
        let creators = proxies
            .iter()
            .map(|proxy| {
                let creator = StoreActionMessageCreator {
                    proxy: Arc::clone(proxy),
                    dispatcher: Arc::clone(&self.dispatcher),
                    destination: self.destination.clone(),
                };
                (proxy.id(), creator)
            })
            .collect();
        StoreActionMessageCreators { creators }
    }
}

/// Outcome of [`StoreActionMessageCreators::get_all_states`].
#[derive(Debug, Default)]
pub struct GetAllStatesReport {
    /// Stores in the order their requests completed.
    pub completion_order: Vec<StoreName>,
    /// Stores whose snapshot was fetched, with what the proxy did with it.
    pub succeeded: BTreeMap<StoreName, ApplyOutcome>,
    /// Stores whose request failed.
    pub failed: BTreeMap<StoreName, SyncError>,
}

impl GetAllStatesReport {
    /// Check if every request succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Creators for a set of stores.
pub struct StoreActionMessageCreators<C: Channel> {
    creators: BTreeMap<StoreName, StoreActionMessageCreator<C>>,
}

impl<C: Channel> Clone for StoreActionMessageCreators<C> {
    fn clone(&self) -> Self {
        Self {
            creators: self.creators.clone(),
        }
    }
}

impl<C: Channel> StoreActionMessageCreators<C> {
    /// Creator for one store.
    pub fn get(&self, store: StoreName) -> Option<&StoreActionMessageCreator<C>> {
        self.creators.get(&store)
    }

    /// Stores with a creator.
    pub fn names(&self) -> Vec<StoreName> {
        self.creators.keys().copied().collect()
    }

    /// Number of creators.
    pub fn len(&self) -> usize {
        self.creators.len()
    }

    /// Check if there are no creators.
    pub fn is_empty(&self) -> bool {
        self.creators.is_empty()
    }
}

impl<C: Channel + 'static> StoreActionMessageCreators<C> {
    /// Fetch every store's snapshot concurrently.
    ///
    /// Requests are independent: none waits for another, responses apply in
    /// whatever order they arrive, and there is no cross-store consistency.
    pub async fn get_all_states(&self) -> GetAllStatesReport {
        let mut tasks = JoinSet::new();
        for creator in self.creators.values() {
            let creator = creator.clone();
            tasks.spawn(async move { (creator.store(), creator.get_state().await) });
        }

        let mut report = GetAllStatesReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((store, Ok(outcome))) => {
                    report.completion_order.push(store);
                    report.succeeded.insert(store, outcome);
                }
                Ok((store, Err(e))) => {
                    tracing::warn!(store = %store, error = %e, "get state failed");
                    report.completion_order.push(store);
                    report.failed.insert(store, e);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "get state task did not finish");
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_envelope, encode_envelope};
    use crate::config::{ReconcilePolicy, SyncConfig};
    use crate::messages::{limits, Envelope};
    use crate::transport::memory::{MemoryChannel, MemoryNetwork};
    use std::time::Duration;
    use storelink_core::{ContextRole, StateValue};

    fn proxies(names: &[StoreName]) -> Vec<Arc<StoreProxy>> {
        names
            .iter()
            .map(|name| Arc::new(StoreProxy::new(*name, ReconcilePolicy::default())))
            .collect()
    }

    async fn panel_dispatcher(network: &Arc<MemoryNetwork>) -> Arc<Dispatcher<MemoryChannel>> {
        let panel = network.connect_new(ContextRole::Panel).await;
        let config = SyncConfig::default().with_request_timeout(Duration::from_millis(200));
        Arc::new(Dispatcher::new(Arc::new(panel), config))
    }

    #[tokio::test]
    async fn test_factory_builds_one_creator_per_proxy() {
        let network = MemoryNetwork::new();
        let dispatcher = panel_dispatcher(&network).await;

        let creators = StoreActionMessageCreatorFactory::new(dispatcher)
            .from_stores(&proxies(&[StoreName::Tab, StoreName::Command]));

        assert_eq!(creators.len(), 2);
        assert_eq!(creators.names(), vec![StoreName::Tab, StoreName::Command]);
        assert_eq!(creators.get(StoreName::Tab).unwrap().store(), StoreName::Tab);
        assert!(creators.get(StoreName::Inspect).is_none());
    }

    #[tokio::test]
    async fn test_get_state_applies_response() {
        let network = MemoryNetwork::new();
        let owner = network.connect_new(ContextRole::Background).await;
        let dispatcher = panel_dispatcher(&network).await;

        let creators = StoreActionMessageCreatorFactory::new(Arc::clone(&dispatcher))
            .from_stores(&proxies(&[StoreName::Tab]));
        let creator = creators.get(StoreName::Tab).unwrap().clone();
        let call = tokio::spawn(async move { creator.get_state().await });

        let (from, bytes) = owner.recv().await.unwrap();
        let request = decode_envelope(&bytes).unwrap();
        let response = Envelope::state_response(
            StoreName::Tab,
            request.token.unwrap(),
            StateValue::encode(&"example.com").unwrap(),
            4,
        );
        let bytes = encode_envelope(&response, limits::DEFAULT_MAX_ENVELOPE_BYTES).unwrap();
        owner
            .send(&DestinationSelector::Context(from), bytes)
            .await
            .unwrap();

        // Nothing runs a receive loop here, so hand the response over directly.
        let (_, bytes) = dispatcher.channel().recv().await.unwrap();
        assert!(dispatcher.resolve(decode_envelope(&bytes).unwrap()));

        assert_eq!(call.await.unwrap().unwrap(), ApplyOutcome::Applied);
        let proxy = creators.get(StoreName::Tab).unwrap().proxy();
        assert_eq!(proxy.applied_version(), Some(4));
        assert_eq!(
            proxy.state().unwrap().decode::<String>().unwrap(),
            "example.com"
        );
    }

    #[tokio::test]
    async fn test_get_all_states_reports_each_failure() {
        let network = MemoryNetwork::new();
        let dispatcher = panel_dispatcher(&network).await;

        let creators = StoreActionMessageCreatorFactory::new(dispatcher)
            .from_stores(&proxies(&[StoreName::Tab, StoreName::Command]));
        let report = creators.get_all_states().await;

        assert!(!report.is_complete());
        assert!(report.succeeded.is_empty());
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.completion_order.len(), 2);
        assert!(report
            .failed
            .values()
            .all(|e| matches!(e, SyncError::Unreachable(_))));
    }
}
