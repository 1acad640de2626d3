//! Store proxies: non-owning mirrors of remote stores.
//!
//! A proxy caches the last snapshot it applied and exposes the same
//! [`StoreLike`] contract as the store it mirrors. It never fetches on its
//! own; snapshots arrive through a message creator or are prompted by a
//! change notification.

use parking_lot::{ReentrantMutex, RwLock};

use storelink_core::{StateValue, StoreName};
use storelink_store::{Listener, ListenerId, ListenerSet, StoreLike};

use crate::config::ReconcilePolicy;
use crate::error::{Result, SyncError};
use crate::messages::{Envelope, MessageType};

/// What a proxy did with an incoming envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The snapshot replaced the cache and listeners ran.
    Applied,
    /// The owner changed; a fresh state request should be issued.
    RefreshRequested,
    /// The snapshot is older than the one already applied and was dropped.
    Stale {
        /// Version currently in the cache.
        applied: u64,
        /// Version that arrived.
        received: u64,
    },
    /// Nothing for a proxy to do (a request addressed to the owner).
    Ignored,
}

#[derive(Default)]
struct Cached {
    state: Option<StateValue>,
    version: Option<u64>,
    applied_count: u64,
}

/// Mirror of one remote store.
pub struct StoreProxy {
    name: StoreName,
    policy: ReconcilePolicy,
    cached: RwLock<Cached>,
    listeners: ListenerSet,
    /// Keeps "replace cache, then notify" atomic relative to other applies.
    apply_order: ReentrantMutex<()>,
}

impl StoreProxy {
    /// Create an unpopulated proxy.
    pub fn new(name: StoreName, policy: ReconcilePolicy) -> Self {
        Self {
            name,
            policy,
            cached: RwLock::new(Cached::default()),
            listeners: ListenerSet::new(),
            apply_order: ReentrantMutex::new(()),
        }
    }

    /// Reconcile policy in use.
    pub fn policy(&self) -> ReconcilePolicy {
        self.policy
    }

    /// Check whether any snapshot has been applied.
    pub fn is_populated(&self) -> bool {
        self.cached.read().state.is_some()
    }

    /// Owner version of the applied snapshot, if known.
    pub fn applied_version(&self) -> Option<u64> {
        self.cached.read().version
    }

    /// Number of snapshots applied so far.
    pub fn applied_count(&self) -> u64 {
        self.cached.read().applied_count
    }

    /// State and version read together.
    pub fn snapshot(&self) -> (Option<StateValue>, Option<u64>) {
        let cached = self.cached.read();
        (cached.state.clone(), cached.version)
    }

    /// Apply an envelope received from the owner.
    ///
    /// - `ChangeNotification` → [`ApplyOutcome::RefreshRequested`]; the
    ///   notification carries no data, so the caller must fetch.
    /// - `StateResponse` → replaces the cache and fires listeners, unless
    ///   the policy rejects it as stale.
    /// - `StateRequest` → [`ApplyOutcome::Ignored`].
    ///
    /// An envelope for another store fails with
    /// [`SyncError::UnknownStoreId`].
    pub fn apply_incoming(&self, envelope: &Envelope) -> Result<ApplyOutcome> {
        if envelope.store != self.name {
            return Err(SyncError::UnknownStoreId(envelope.store));
        }

        match envelope.message_type {
            MessageType::ChangeNotification => Ok(ApplyOutcome::RefreshRequested),
            MessageType::StateRequest => Ok(ApplyOutcome::Ignored),
            MessageType::StateResponse => {
                let payload = envelope.payload.clone().ok_or_else(|| {
                    SyncError::InvalidMessage("state response without payload".into())
                })?;
                Ok(self.apply_snapshot(payload, envelope.version))
            }
        }
    }

    fn apply_snapshot(&self, payload: StateValue, version: Option<u64>) -> ApplyOutcome {
        let _order = self.apply_order.lock();

        {
            let mut cached = self.cached.write();

            if self.policy == ReconcilePolicy::HighestVersionWins {
                if let (Some(applied), Some(received)) = (cached.version, version) {
                    if received < applied {
                        tracing::debug!(
                            store = %self.name,
                            applied,
                            received,
                            "stale snapshot dropped"
                        );
                        return ApplyOutcome::Stale { applied, received };
                    }
                }
            }

            cached.state = Some(payload);
            if version.is_some() {
                cached.version = version;
            }
            cached.applied_count += 1;
        }

        tracing::trace!(store = %self.name, version = ?version, "snapshot applied");
        self.listeners.notify();
        ApplyOutcome::Applied
    }
}

impl StoreLike for StoreProxy {
    fn id(&self) -> StoreName {
        self.name
    }

    fn state(&self) -> Option<StateValue> {
        self.cached.read().state.clone()
    }

    fn add_changed_listener(&self, listener: Listener) -> ListenerId {
        self.listeners.add(listener)
    }

    fn remove_changed_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

impl std::fmt::Debug for StoreProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreProxy")
            .field("name", &self.name)
            .field("populated", &self.is_populated())
            .field("version", &self.applied_version())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::CorrelationToken;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    fn response(count: u32, version: u64) -> Envelope {
        Envelope::state_response(
            StoreName::Tab,
            CorrelationToken(version),
            StateValue::encode(&json!({ "count": count })).unwrap(),
            version,
        )
    }

    fn counter(proxy: &StoreProxy) -> Option<u64> {
        proxy
            .state()
            .map(|s| s.decode::<serde_json::Value>().unwrap()["count"].as_u64().unwrap())
    }

    #[test]
    fn test_unset_before_any_message() {
        let proxy = StoreProxy::new(StoreName::Tab, ReconcilePolicy::default());
        assert_eq!(proxy.state(), None);
        assert!(!proxy.is_populated());
        assert_eq!(proxy.applied_version(), None);
    }

    #[test]
    fn test_response_replaces_cache_and_notifies() {
        let proxy = StoreProxy::new(StoreName::Tab, ReconcilePolicy::default());
        let hits = Arc::new(Mutex::new(0));
        {
            let hits = Arc::clone(&hits);
            proxy.add_changed_listener(Arc::new(move || *hits.lock() += 1));
        }

        let outcome = proxy.apply_incoming(&response(3, 1)).unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(counter(&proxy), Some(3));
        assert_eq!(proxy.applied_version(), Some(1));
        assert_eq!(*hits.lock(), 1);
    }

    #[test]
    fn test_same_payload_twice_fires_twice() {
        let proxy = StoreProxy::new(StoreName::Tab, ReconcilePolicy::default());
        let hits = Arc::new(Mutex::new(0));
        {
            let hits = Arc::clone(&hits);
            proxy.add_changed_listener(Arc::new(move || *hits.lock() += 1));
        }

        proxy.apply_incoming(&response(1, 1)).unwrap();
        let first = proxy.state();
        proxy.apply_incoming(&response(1, 1)).unwrap();

        assert_eq!(proxy.state(), first);
        assert_eq!(*hits.lock(), 2);
        assert_eq!(proxy.applied_count(), 2);
    }

    #[test]
    fn test_notification_requests_refresh_without_touching_cache() {
        let proxy = StoreProxy::new(StoreName::Tab, ReconcilePolicy::default());
        let outcome = proxy
            .apply_incoming(&Envelope::change_notification(StoreName::Tab, 4))
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::RefreshRequested);
        assert_eq!(proxy.state(), None);
    }

    #[test]
    fn test_other_store_rejected() {
        let proxy = StoreProxy::new(StoreName::Inspect, ReconcilePolicy::default());
        let err = proxy.apply_incoming(&response(1, 1)).unwrap_err();
        assert!(matches!(err, SyncError::UnknownStoreId(StoreName::Tab)));
    }

    #[test]
    fn test_request_ignored() {
        let proxy = StoreProxy::new(StoreName::Tab, ReconcilePolicy::default());
        let outcome = proxy
            .apply_incoming(&Envelope::state_request(StoreName::Tab, CorrelationToken(1)))
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Ignored);
    }

    #[test]
    fn test_last_arrival_wins_accepts_older_snapshot() {
        let proxy = StoreProxy::new(StoreName::Tab, ReconcilePolicy::LastArrivalWins);
        proxy.apply_incoming(&response(2, 2)).unwrap();
        proxy.apply_incoming(&response(1, 1)).unwrap();
        assert_eq!(counter(&proxy), Some(1));
        assert_eq!(proxy.applied_version(), Some(1));
    }

    #[test]
    fn test_highest_version_wins_drops_older_snapshot() {
        let proxy = StoreProxy::new(StoreName::Tab, ReconcilePolicy::HighestVersionWins);
        proxy.apply_incoming(&response(2, 2)).unwrap();
        let outcome = proxy.apply_incoming(&response(1, 1)).unwrap();
        assert_eq!(
            outcome,
            ApplyOutcome::Stale {
                applied: 2,
                received: 1
            }
        );
        assert_eq!(counter(&proxy), Some(2));
    }

    #[test]
    fn test_never_reverts_to_unset() {
        let proxy = StoreProxy::new(StoreName::Tab, ReconcilePolicy::default());
        proxy.apply_incoming(&response(0, 0)).unwrap();
        proxy
            .apply_incoming(&Envelope::change_notification(StoreName::Tab, 1))
            .unwrap();
        assert!(proxy.is_populated());
    }

    #[test]
    fn test_polymorphic_over_store_like() {
        fn read_count(store: &dyn StoreLike) -> Option<StateValue> {
            store.state()
        }
        let proxy = StoreProxy::new(StoreName::Tab, ReconcilePolicy::default());
        proxy.apply_incoming(&response(8, 1)).unwrap();
        assert!(read_count(&proxy).is_some());
    }
}
