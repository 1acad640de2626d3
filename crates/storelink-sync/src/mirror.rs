//! Consumer-side mirror: the proxies one context keeps, plus the creators
//! that populate them.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::task::JoinHandle;

use storelink_core::StoreName;

use crate::creator::{
    GetAllStatesReport, StoreActionMessageCreatorFactory, StoreActionMessageCreators,
};
use crate::dispatcher::Dispatcher;
use crate::error::{Result, SyncError};
use crate::messages::Envelope;
use crate::proxy::{ApplyOutcome, StoreProxy};
use crate::transport::Channel;

/// Proxies and creators for the stores one context mirrors.
pub struct Mirror<C: Channel> {
    proxies: BTreeMap<StoreName, Arc<StoreProxy>>,
    creators: StoreActionMessageCreators<C>,
}

impl<C: Channel + 'static> Mirror<C> {
    /// Build a proxy and a creator for every named store.
    ///
    /// Proxies start unpopulated; call [`Mirror::get_all_states`] or wait
    /// for the first change notification.
    pub fn new(dispatcher: Arc<Dispatcher<C>>, stores: &[StoreName]) -> Self {
        let policy = dispatcher.config().reconcile;
        let proxies: BTreeMap<StoreName, Arc<StoreProxy>> = stores
            .iter()
            .map(|name| (*name, Arc::new(StoreProxy::new(*name, policy))))
            .collect();

        let list: Vec<Arc<StoreProxy>> = proxies.values().cloned().collect();
        let creators = StoreActionMessageCreatorFactory::new(dispatcher).from_stores(&list);

        Self { proxies, creators }
    }

    /// Proxy for one store.
    pub fn proxy(&self, store: StoreName) -> Option<Arc<StoreProxy>> {
        self.proxies.get(&store).cloned()
    }

    /// All proxies in code order.
    pub fn proxies(&self) -> Vec<Arc<StoreProxy>> {
        self.proxies.values().cloned().collect()
    }

    /// Mirrored store names.
    pub fn names(&self) -> Vec<StoreName> {
        self.proxies.keys().copied().collect()
    }

    /// The creators populating the proxies.
    pub fn creators(&self) -> &StoreActionMessageCreators<C> {
        &self.creators
    }

    /// Fetch every mirrored store concurrently.
    pub async fn get_all_states(&self) -> GetAllStatesReport {
        self.creators.get_all_states().await
    }

    /// Handle a change notification from the owner.
    ///
    /// The refresh runs as its own task so the caller (the receive loop,
    /// which also has to deliver the response) never waits on it.
    pub fn handle_notification(&self, envelope: &Envelope) -> Result<Option<JoinHandle<()>>> {
        let proxy = self
            .proxies
            .get(&envelope.store)
            .ok_or(SyncError::UnknownStoreId(envelope.store))?;

        if proxy.apply_incoming(envelope)? != ApplyOutcome::RefreshRequested {
            return Ok(None);
        }

        let creator = self
            .creators
            .get(envelope.store)
            .cloned()
            .ok_or(SyncError::UnknownStoreId(envelope.store))?;
        let version = envelope.version;

        Ok(Some(tokio::spawn(async move {
            match creator.get_state().await {
                Ok(outcome) => {
                    tracing::debug!(
                        store = %creator.store(),
                        notified_version = ?version,
                        outcome = ?outcome,
                        "refreshed after change notification"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        store = %creator.store(),
                        error = %e,
                        "refresh after change notification failed"
                    );
                }
            }
        })))
    }
}
