//! Message channel abstraction.
//!
//! The channel moves opaque bytes between isolated contexts. It makes no
//! ordering promise across separate sends and may lose messages to
//! contexts that have gone away. Implementations may wrap a browser
//! runtime port, a websocket, or the in-memory network used in tests.

use async_trait::async_trait;
use bytes::Bytes;

use storelink_core::{ContextId, ContextRole, DestinationSelector};

use crate::error::Result;

/// Per-destination outcome of one send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Contexts the message was handed to.
    pub delivered: Vec<ContextId>,
    /// Contexts that could not be reached, with the reason.
    pub failed: Vec<(ContextId, String)>,
}

impl DeliveryReport {
    /// Check if at least one destination accepted the message.
    pub fn any_delivered(&self) -> bool {
        !self.delivered.is_empty()
    }

    /// Check if every destination accepted the message.
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Channel trait for moving encoded envelopes between contexts.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Channel: Send + Sync {
    /// Send bytes to every context the selector picks.
    ///
    /// A destination that cannot be reached is recorded in the report and
    /// does not stop delivery to the others.
    async fn send(&self, destination: &DestinationSelector, message: Bytes) -> Result<DeliveryReport>;

    /// Receive the next message from any context.
    ///
    /// Returns the sender's id and the bytes. Fails with
    /// [`SyncError::ChannelClosed`](crate::SyncError::ChannelClosed) once
    /// this end has been disconnected.
    async fn recv(&self) -> Result<(ContextId, Bytes)>;

    /// Receive with timeout.
    ///
    /// Returns None if the timeout expires before a message arrives.
    async fn recv_timeout(&self, timeout: std::time::Duration) -> Result<Option<(ContextId, Bytes)>>;

    /// This context's identity.
    fn local_context_id(&self) -> ContextId;

    /// This context's role.
    fn local_role(&self) -> ContextRole;

    /// Other contexts currently connected.
    async fn connected_contexts(&self) -> Result<Vec<(ContextId, ContextRole)>>;
}

/// An in-memory channel network for tests and single-process hosts.
///
/// Uses tokio channels to simulate message passing between contexts.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::{mpsc, Mutex, RwLock};

    use crate::error::SyncError;

    /// Queue depth per context.
    pub const CHANNEL_CAPACITY: usize = 1000;

    struct Inbound {
        from: ContextId,
        message: Bytes,
    }

    struct Route {
        role: ContextRole,
        sender: mpsc::Sender<Inbound>,
    }

    /// Shared state for the in-memory network.
    pub struct MemoryNetwork {
        routes: RwLock<HashMap<ContextId, Route>>,
    }

    impl MemoryNetwork {
        /// Create a new network.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Connect a context and return its channel end.
        pub async fn connect(self: &Arc<Self>, id: ContextId, role: ContextRole) -> MemoryChannel {
            let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

            self.routes
                .write()
                .await
                .insert(id, Route { role, sender: tx });

            MemoryChannel {
                id,
                role,
                network: Arc::clone(self),
                receiver: Mutex::new(rx),
            }
        }

        /// Connect a context under a fresh random id.
        pub async fn connect_new(self: &Arc<Self>, role: ContextRole) -> MemoryChannel {
            self.connect(ContextId::random(), role).await
        }

        /// Simulate a context unloading: nothing can reach it any more and
        /// its own receive loop ends.
        pub async fn disconnect(&self, id: &ContextId) -> bool {
            self.routes.write().await.remove(id).is_some()
        }

        /// Check whether a context is connected.
        pub async fn is_connected(&self, id: &ContextId) -> bool {
            self.routes.read().await.contains_key(id)
        }
    }

    impl Default for MemoryNetwork {
        fn default() -> Self {
            Self {
                routes: RwLock::new(HashMap::new()),
            }
        }
    }

    /// One context's end of the in-memory network.
    pub struct MemoryChannel {
        id: ContextId,
        role: ContextRole,
        network: Arc<MemoryNetwork>,
        receiver: Mutex<mpsc::Receiver<Inbound>>,
    }

    #[async_trait]
    impl Channel for MemoryChannel {
        async fn send(
            &self,
            destination: &DestinationSelector,
            message: Bytes,
        ) -> Result<DeliveryReport> {
            // Snapshot the matching senders so no lock is held across sends.
            let (targets, mut report) = {
                let routes = self.network.routes.read().await;
                let targets: Vec<(ContextId, mpsc::Sender<Inbound>)> = routes
                    .iter()
                    .filter(|(id, route)| destination.selects(&self.id, id, route.role))
                    .map(|(id, route)| (*id, route.sender.clone()))
                    .collect();

                let mut report = DeliveryReport::default();
                for id in destination.explicit_targets() {
                    if *id != self.id && !routes.contains_key(id) {
                        report.failed.push((*id, "context not found".into()));
                    }
                }
                (targets, report)
            };

            for (id, sender) in targets {
                let inbound = Inbound {
                    from: self.id,
                    message: message.clone(),
                };
                match sender.send(inbound).await {
                    Ok(()) => report.delivered.push(id),
                    Err(_) => report.failed.push((id, "context unloaded".into())),
                }
            }

            Ok(report)
        }

        async fn recv(&self) -> Result<(ContextId, Bytes)> {
            let mut rx = self.receiver.lock().await;
            match rx.recv().await {
                Some(inbound) => Ok((inbound.from, inbound.message)),
                None => Err(SyncError::ChannelClosed),
            }
        }

        async fn recv_timeout(
            &self,
            timeout: std::time::Duration,
        ) -> Result<Option<(ContextId, Bytes)>> {
            let mut rx = self.receiver.lock().await;
            match tokio::time::timeout(timeout, rx.recv()).await {
                Ok(Some(inbound)) => Ok(Some((inbound.from, inbound.message))),
                Ok(None) => Err(SyncError::ChannelClosed),
                Err(_) => Ok(None),
            }
        }

        fn local_context_id(&self) -> ContextId {
            self.id
        }

        fn local_role(&self) -> ContextRole {
            self.role
        }

        async fn connected_contexts(&self) -> Result<Vec<(ContextId, ContextRole)>> {
            let routes = self.network.routes.read().await;
            Ok(routes
                .iter()
                .filter(|(id, _)| **id != self.id)
                .map(|(id, route)| (*id, route.role))
                .collect())
        }
    }
}
