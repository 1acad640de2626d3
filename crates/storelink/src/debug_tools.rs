//! Development-only inspection of a session's stores.

use std::sync::Arc;

use serde::Serialize;

use storelink_core::{state_digest, ContextId, ContextRole, StateValue, StoreName};
use storelink_store::{StoreLike, StoreRegistry};
use storelink_sync::StoreProxy;

use crate::error::Result;

/// Which side of the protocol a store sits on in this context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreSide {
    /// An authoritative store in this context's registry.
    Owned,
    /// A proxy of a store owned elsewhere.
    Mirrored,
}

/// One store as seen by this context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugEntry {
    /// Store identity.
    pub store: StoreName,
    /// Owned or mirrored.
    pub side: StoreSide,
    /// False for a proxy that has not applied a snapshot yet.
    pub populated: bool,
    /// Store version, or the version of the last applied snapshot.
    pub version: Option<u64>,
    /// State as JSON, `null` while unpopulated.
    pub state: serde_json::Value,
    /// Hex blake3 state digest, comparable across contexts.
    pub digest: Option<String>,
}

/// Everything a context holds, at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugSnapshot {
    /// Hex id of the inspected context.
    pub context: String,
    /// Role of the inspected context.
    pub role: ContextRole,
    /// Owned stores first, then mirrored ones.
    pub entries: Vec<DebugEntry>,
}

impl DebugSnapshot {
    /// Look up one store's entry.
    pub fn entry(&self, store: StoreName, side: StoreSide) -> Option<&DebugEntry> {
        self.entries
            .iter()
            .find(|e| e.store == store && e.side == side)
    }

    /// Render as indented JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Read-only view over a session's owned stores and proxies.
#[derive(Clone)]
pub struct DebugTools {
    context: ContextId,
    role: ContextRole,
    registry: Option<Arc<StoreRegistry>>,
    proxies: Vec<Arc<StoreProxy>>,
}

impl DebugTools {
    pub(crate) fn new(
        context: ContextId,
        role: ContextRole,
        registry: Option<Arc<StoreRegistry>>,
        proxies: Vec<Arc<StoreProxy>>,
    ) -> Self {
        Self {
            context,
            role,
            registry,
            proxies,
        }
    }

    /// Capture every owned store, then every proxy, in store code order.
    pub fn snapshot(&self) -> Result<DebugSnapshot> {
        let mut entries = Vec::new();

        if let Some(registry) = &self.registry {
            for store in registry.stores() {
                let (state, version) = store.snapshot();
                entries.push(entry(store.id(), StoreSide::Owned, Some(state), Some(version))?);
            }
        }

        for proxy in &self.proxies {
            let (state, version) = proxy.snapshot();
            entries.push(entry(proxy.id(), StoreSide::Mirrored, state, version)?);
        }

        Ok(DebugSnapshot {
            context: self.context.to_hex(),
            role: self.role,
            entries,
        })
    }
}

impl std::fmt::Debug for DebugTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugTools")
            .field("context", &self.context)
            .field("role", &self.role)
            .field("proxies", &self.proxies.len())
            .finish_non_exhaustive()
    }
}

fn entry(
    store: StoreName,
    side: StoreSide,
    state: Option<StateValue>,
    version: Option<u64>,
) -> Result<DebugEntry> {
    let Some(state) = state else {
        return Ok(DebugEntry {
            store,
            side,
            populated: false,
            version,
            state: serde_json::Value::Null,
            digest: None,
        });
    };

    let digest = state_digest(store, &state)?;
    Ok(DebugEntry {
        store,
        side,
        populated: true,
        version,
        state: render(&state),
        digest: Some(digest.to_hex()),
    })
}

/// Anything JSON cannot represent is shown in its CBOR debug form.
fn render(state: &StateValue) -> serde_json::Value {
    state
        .decode::<serde_json::Value>()
        .unwrap_or_else(|_| serde_json::Value::String(format!("{:?}", state.as_value())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use storelink_core::state::Value;
    use storelink_store::LocalStore;
    use storelink_sync::ReconcilePolicy;

    #[test]
    fn test_snapshot_lists_owned_and_mirrored() {
        let registry = Arc::new(StoreRegistry::new());
        registry
            .register(LocalStore::with_state(StoreName::Tab, &json!({ "count": 3 })).unwrap())
            .unwrap();
        let proxy = Arc::new(StoreProxy::new(
            StoreName::Command,
            ReconcilePolicy::default(),
        ));

        let tools = DebugTools::new(
            ContextId::random(),
            ContextRole::Background,
            Some(registry),
            vec![proxy],
        );
        let snapshot = tools.snapshot().unwrap();
        assert_eq!(snapshot.entries.len(), 2);

        let owned = snapshot.entry(StoreName::Tab, StoreSide::Owned).unwrap();
        assert!(owned.populated);
        assert_eq!(owned.version, Some(0));
        assert_eq!(owned.state, json!({ "count": 3 }));
        assert_eq!(owned.digest.as_ref().unwrap().len(), 64);

        let mirrored = snapshot
            .entry(StoreName::Command, StoreSide::Mirrored)
            .unwrap();
        assert!(!mirrored.populated);
        assert_eq!(mirrored.state, serde_json::Value::Null);
        assert!(mirrored.digest.is_none());
    }

    #[test]
    fn test_non_json_state_falls_back_to_debug_form() {
        // JSON objects only have string keys.
        let state = StateValue::from_value(Value::Map(vec![(
            Value::Integer(1.into()),
            Value::Bool(true),
        )]));
        assert!(render(&state).is_string());
    }

    #[test]
    fn test_pretty_json() {
        let tools = DebugTools::new(ContextId::random(), ContextRole::Panel, None, Vec::new());
        let json = tools.snapshot().unwrap().to_json_pretty().unwrap();
        assert!(json.contains("\"role\": \"Panel\""));
    }
}
