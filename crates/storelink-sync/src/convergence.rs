//! Convergence checks between a proxy and the store it mirrors.
//!
//! After a sync round, the owner can publish `(version, digest)` for a
//! store and a consumer can compare it with its proxy without moving the
//! snapshot again.

use storelink_core::{state_digest, Blake3Hash};
use storelink_store::{LocalStore, StoreLike};

use crate::error::Result;
use crate::proxy::StoreProxy;

/// Result of convergence verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceResult {
    /// The proxy holds exactly the owner's current state.
    Converged,
    /// The proxy has never been populated.
    NotPopulated,
    /// The proxy holds an older version than the owner.
    Stale {
        local_version: Option<u64>,
        remote_version: u64,
    },
    /// Same or newer version but different content.
    Diverged {
        local_digest: Blake3Hash,
        remote_digest: Blake3Hash,
    },
}

impl ConvergenceResult {
    /// Check if the proxy has converged.
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceResult::Converged)
    }
}

/// Compare a proxy with an owner-published version and digest.
pub fn verify_against(
    proxy: &StoreProxy,
    remote_version: u64,
    remote_digest: &Blake3Hash,
) -> Result<ConvergenceResult> {
    let (state, local_version) = proxy.snapshot();
    let Some(state) = state else {
        return Ok(ConvergenceResult::NotPopulated);
    };

    let local_digest = state_digest(proxy.id(), &state)?;
    if &local_digest == remote_digest {
        return Ok(ConvergenceResult::Converged);
    }

    match local_version {
        Some(local) if local >= remote_version => Ok(ConvergenceResult::Diverged {
            local_digest,
            remote_digest: *remote_digest,
        }),
        _ => Ok(ConvergenceResult::Stale {
            local_version,
            remote_version,
        }),
    }
}

/// Compare a proxy with the local store it mirrors.
///
/// Only meaningful when both live in one process (tests, single-process
/// hosts); across real contexts use [`verify_against`].
pub fn verify_convergence(proxy: &StoreProxy, owner: &LocalStore) -> Result<ConvergenceResult> {
    let (state, version) = owner.snapshot();
    let digest = state_digest(owner.id(), &state)?;
    verify_against(proxy, version, &digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconcilePolicy;
    use crate::messages::{CorrelationToken, Envelope};
    use serde_json::json;
    use storelink_core::{StateValue, StoreName};

    fn owner(count: u32) -> LocalStore {
        LocalStore::with_state(StoreName::Tab, &json!({ "count": count })).unwrap()
    }

    fn apply(proxy: &StoreProxy, count: u32, version: u64) {
        let envelope = Envelope::state_response(
            StoreName::Tab,
            CorrelationToken(version),
            StateValue::encode(&json!({ "count": count })).unwrap(),
            version,
        );
        proxy.apply_incoming(&envelope).unwrap();
    }

    #[test]
    fn test_unpopulated() {
        let proxy = StoreProxy::new(StoreName::Tab, ReconcilePolicy::default());
        let result = verify_convergence(&proxy, &owner(0)).unwrap();
        assert_eq!(result, ConvergenceResult::NotPopulated);
    }

    #[test]
    fn test_converged() {
        let proxy = StoreProxy::new(StoreName::Tab, ReconcilePolicy::default());
        apply(&proxy, 0, 0);
        assert!(verify_convergence(&proxy, &owner(0)).unwrap().is_converged());
    }

    #[test]
    fn test_stale() {
        let store = owner(0);
        let proxy = StoreProxy::new(StoreName::Tab, ReconcilePolicy::default());
        apply(&proxy, 0, 0);

        store.set_from(&json!({ "count": 1 })).unwrap();
        let result = verify_convergence(&proxy, &store).unwrap();
        assert_eq!(
            result,
            ConvergenceResult::Stale {
                local_version: Some(0),
                remote_version: 1
            }
        );
    }

    #[test]
    fn test_diverged() {
        let store = owner(0);
        let proxy = StoreProxy::new(StoreName::Tab, ReconcilePolicy::default());
        apply(&proxy, 5, 0);

        let result = verify_convergence(&proxy, &store).unwrap();
        assert!(matches!(result, ConvergenceResult::Diverged { .. }));
    }
}
