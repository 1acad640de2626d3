//! Context sessions.
//!
//! A session binds one context's channel to the stores it owns and the
//! stores it mirrors, and runs the receive loop for it.

use std::sync::Arc;

use tokio::task::JoinHandle;

use storelink_core::{Blake3Hash, ContextId, ContextRole, StoreName};
use storelink_store::{LocalStore, StoreRegistry};
use storelink_sync::{
    ApplyOutcome, Channel, ChangeBroadcaster, ConvergenceResult, Dispatcher, Endpoint,
    EndpointReport, GetAllStatesReport, Mirror, Responder, StoreProxy, SyncConfig,
};

use crate::debug_tools::DebugTools;
use crate::error::{Error, Result};
use crate::initializer::Flavor;

/// Configuration for a session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Production or development bootstrap.
    pub flavor: Flavor,
    /// Sync configuration.
    pub sync: SyncConfig,
}

impl SessionConfig {
    /// Set the flavor.
    pub fn with_flavor(mut self, flavor: Flavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// Set the sync configuration.
    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }
}

/// Builder for [`ContextSession`].
pub struct ContextSessionBuilder<C: Channel> {
    channel: Arc<C>,
    config: SessionConfig,
    owned: Option<Arc<StoreRegistry>>,
    mirrored: Vec<StoreName>,
}

impl<C: Channel + 'static> ContextSessionBuilder<C> {
    /// Replace the configuration.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Own the stores in a registry: answer requests and push changes.
    pub fn own(mut self, registry: Arc<StoreRegistry>) -> Self {
        self.owned = Some(registry);
        self
    }

    /// Mirror stores owned by another context.
    pub fn mirror(mut self, stores: &[StoreName]) -> Self {
        self.mirrored.extend_from_slice(stores);
        self
    }

    /// Start the session.
    ///
    /// Spawns the receive loop, and the change pump if the session owns
    /// stores, so it must be called inside a tokio runtime. Proxies start
    /// unpopulated; call [`ContextSession::get_all_states`] to fill them.
    pub fn start(self) -> Result<ContextSession<C>> {
        if self.owned.is_none() && self.mirrored.is_empty() {
            return Err(Error::InvalidOperation(
                "session neither owns nor mirrors any store".into(),
            ));
        }

        let context = self.channel.local_context_id();
        let role = self.channel.local_role();
        let dispatcher = Arc::new(Dispatcher::new(self.channel, self.config.sync.clone()));
        let mut endpoint = Endpoint::new(Arc::clone(&dispatcher));
        let mut broadcaster = None;
        if let Some(registry) = &self.owned {
            endpoint = endpoint.with_responder(Responder::new(
                Arc::clone(registry),
                Arc::clone(&dispatcher),
            ));
            broadcaster = Some(ChangeBroadcaster::start(registry, Arc::clone(&dispatcher)));
        }

        let mirror = if self.mirrored.is_empty() {
            None
        } else {
            let mirror = Arc::new(Mirror::new(Arc::clone(&dispatcher), &self.mirrored));
            endpoint = endpoint.with_mirror(Arc::clone(&mirror));
            Some(mirror)
        };

        let debug_tools = self.config.flavor.is_development().then(|| {
            DebugTools::new(
                context,
                role,
                self.owned.clone(),
                mirror.as_ref().map(|m| m.proxies()).unwrap_or_default(),
            )
        });

        tracing::debug!(
            context = %context,
            role = %role,
            owned = self.owned.as_ref().map(|r| r.len()).unwrap_or(0),
            mirrored = mirror.as_ref().map(|m| m.names().len()).unwrap_or(0),
            flavor = ?self.config.flavor,
            "session started"
        );

        Ok(ContextSession {
            context,
            role,
            config: self.config,
            dispatcher,
            registry: self.owned,
            mirror,
            broadcaster,
            endpoint: Some(endpoint.spawn()),
            debug_tools,
        })
    }
}

/// One context's view of the synchronized stores.
pub struct ContextSession<C: Channel> {
    context: ContextId,
    role: ContextRole,
    config: SessionConfig,
    dispatcher: Arc<Dispatcher<C>>,
    registry: Option<Arc<StoreRegistry>>,
    mirror: Option<Arc<Mirror<C>>>,
    broadcaster: Option<ChangeBroadcaster>,
    endpoint: Option<JoinHandle<EndpointReport>>,
    debug_tools: Option<DebugTools>,
}

impl<C: Channel + 'static> ContextSession<C> {
    /// Start building a session on a channel.
    pub fn builder(channel: Arc<C>) -> ContextSessionBuilder<C> {
        ContextSessionBuilder {
            channel,
            config: SessionConfig::default(),
            owned: None,
            mirrored: Vec::new(),
        }
    }

    /// This context's id.
    pub fn context_id(&self) -> ContextId {
        self.context
    }

    /// This context's role.
    pub fn role(&self) -> ContextRole {
        self.role
    }

    /// Get the configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Get the dispatcher.
    pub fn dispatcher(&self) -> &Arc<Dispatcher<C>> {
        &self.dispatcher
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Owned stores
    // ─────────────────────────────────────────────────────────────────────────

    /// The registry of owned stores, if this context owns any.
    pub fn registry(&self) -> Option<&Arc<StoreRegistry>> {
        self.registry.as_ref()
    }

    /// An owned store.
    pub fn store(&self, name: StoreName) -> Option<Arc<LocalStore>> {
        self.registry.as_ref().and_then(|r| r.get(name))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mirrored stores
    // ─────────────────────────────────────────────────────────────────────────

    /// A mirrored store's proxy.
    pub fn proxy(&self, name: StoreName) -> Option<Arc<StoreProxy>> {
        self.mirror.as_ref().and_then(|m| m.proxy(name))
    }

    /// Names of the mirrored stores.
    pub fn mirrored(&self) -> Vec<StoreName> {
        self.mirror.as_ref().map(|m| m.names()).unwrap_or_default()
    }

    /// Fetch every mirrored store concurrently.
    ///
    /// Per-store failures are reported, not raised; the call itself only
    /// fails when the session mirrors nothing.
    pub async fn get_all_states(&self) -> Result<GetAllStatesReport> {
        let mirror = self
            .mirror
            .as_ref()
            .ok_or_else(|| Error::InvalidOperation("session mirrors no stores".into()))?;
        Ok(mirror.get_all_states().await)
    }

    /// Fetch one mirrored store.
    pub async fn get_state(&self, name: StoreName) -> Result<ApplyOutcome> {
        let creator = self
            .mirror
            .as_ref()
            .and_then(|m| m.creators().get(name))
            .ok_or(Error::NotMirrored(name))?;
        Ok(creator.get_state().await?)
    }

    /// Compare a proxy with a store's owner-published version and digest.
    pub fn verify(
        &self,
        name: StoreName,
        remote_version: u64,
        remote_digest: &Blake3Hash,
    ) -> Result<ConvergenceResult> {
        let proxy = self.proxy(name).ok_or(Error::NotMirrored(name))?;
        Ok(storelink_sync::verify_against(
            &proxy,
            remote_version,
            remote_digest,
        )?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Debug tools; only present in development sessions.
    pub fn debug_tools(&self) -> Option<&DebugTools> {
        self.debug_tools.as_ref()
    }

    /// Stop pushing changes and stop the receive loop.
    ///
    /// Requests still waiting for a response fail with a timeout or a
    /// closed channel; their pending entries are removed either way.
    pub fn shutdown(mut self) {
        self.stop();
    }
}

impl<C: Channel> ContextSession<C> {
    fn stop(&mut self) {
        if let Some(mut broadcaster) = self.broadcaster.take() {
            broadcaster.shutdown();
        }
        if let Some(endpoint) = self.endpoint.take() {
            endpoint.abort();
            tracing::debug!(context = %self.context, "session stopped");
        }
    }
}

impl<C: Channel> Drop for ContextSession<C> {
    fn drop(&mut self) {
        self.stop();
    }
}
