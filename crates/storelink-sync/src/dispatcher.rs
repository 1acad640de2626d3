//! Message dispatcher: typed envelopes out, correlated replies back.
//!
//! The dispatcher wraps a [`Channel`]. Fire-and-forget envelopes go out
//! through [`Dispatcher::dispatch`]; state requests go through
//! [`Dispatcher::request`], which parks a pending entry under a fresh
//! correlation token until the receive loop hands the matching response to
//! [`Dispatcher::resolve`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use storelink_core::{DestinationSelector, StoreName};

use crate::codec::encode_envelope;
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::messages::{CorrelationToken, Envelope, MessageType};
use crate::transport::{Channel, DeliveryReport};

/// An outstanding state request.
struct PendingRequest {
    store: StoreName,
    reply: oneshot::Sender<Envelope>,
}

type PendingMap = Mutex<HashMap<CorrelationToken, PendingRequest>>;

/// Removes a pending entry when the awaiting request finishes or is dropped.
///
/// A context that unloads mid-request simply drops the future; the guard
/// makes sure nothing stays behind in the map.
struct PendingGuard<'a> {
    pending: &'a PendingMap,
    token: CorrelationToken,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.token);
    }
}

/// Dispatcher for one context.
pub struct Dispatcher<C: Channel> {
    channel: Arc<C>,
    config: SyncConfig,
    next_token: AtomicU64,
    pending: PendingMap,
}

impl<C: Channel> Dispatcher<C> {
    /// Create a dispatcher over a channel.
    pub fn new(channel: Arc<C>, config: SyncConfig) -> Self {
        Self {
            channel,
            config,
            next_token: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// The underlying channel.
    pub fn channel(&self) -> &Arc<C> {
        &self.channel
    }

    /// Configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Number of requests still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Send an envelope to every context the selector picks.
    ///
    /// Encoding happens first; a payload that cannot cross fails with
    /// [`SyncError::Serialization`] and nothing is sent. Unreachable
    /// destinations are listed in the report and logged; they do not fail
    /// the call.
    pub async fn dispatch(
        &self,
        destination: &DestinationSelector,
        envelope: &Envelope,
    ) -> Result<DeliveryReport> {
        let bytes = encode_envelope(envelope, self.config.max_envelope_bytes)?;

        tracing::debug!(
            message_type = %envelope.message_type,
            store = %envelope.store,
            token = ?envelope.token,
            destination = %destination,
            "dispatch"
        );

        let report = self.channel.send(destination, bytes).await?;

        for (context, reason) in &report.failed {
            tracing::debug!(
                store = %envelope.store,
                context = %context,
                reason = %reason,
                "destination unreachable"
            );
        }

        Ok(report)
    }

    /// Request the current snapshot of a store and wait for the response.
    ///
    /// Fails with [`SyncError::Unreachable`] if no destination accepted the
    /// request, and with [`SyncError::DeliveryTimeout`] if no response
    /// arrived within `request_timeout`. There is no retry.
    pub async fn request(
        &self,
        destination: &DestinationSelector,
        store: StoreName,
    ) -> Result<Envelope> {
        let token = CorrelationToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let (reply, response) = oneshot::channel();

        self.pending
            .lock()
            .insert(token, PendingRequest { store, reply });
        let _guard = PendingGuard {
            pending: &self.pending,
            token,
        };

        let envelope = Envelope::state_request(store, token);
        let report = self.dispatch(destination, &envelope).await?;
        if !report.any_delivered() {
            return Err(SyncError::Unreachable(format!("{store} via {destination}")));
        }

        match tokio::time::timeout(self.config.request_timeout, response).await {
            Ok(Ok(envelope)) => Ok(envelope),
            Ok(Err(_)) => Err(SyncError::ChannelClosed),
            Err(_) => {
                tracing::warn!(store = %store, token = %token, "state request timed out");
                Err(SyncError::DeliveryTimeout { store, token })
            }
        }
    }

    /// Hand a response to the request waiting for it.
    ///
    /// Returns false for anything that is not a response to a live request:
    /// late responses (after timeout), duplicates, or a token answered for
    /// the wrong store.
    pub fn resolve(&self, envelope: Envelope) -> bool {
        if envelope.message_type != MessageType::StateResponse {
            return false;
        }
        let Some(token) = envelope.token else {
            return false;
        };

        let pending = {
            let mut pending = self.pending.lock();
            let expected = pending.get(&token).map(|entry| entry.store);
            match expected {
                Some(expected) if expected != envelope.store => {
                    tracing::warn!(
                        token = %token,
                        expected = %expected,
                        got = %envelope.store,
                        "response store does not match request"
                    );
                    return false;
                }
                Some(_) => pending.remove(&token),
                None => None,
            }
        };

        match pending {
            Some(entry) => entry.reply.send(envelope).is_ok(),
            None => {
                tracing::debug!(
                    token = %token,
                    store = %envelope.store,
                    "response without pending request"
                );
                false
            }
        }
    }
}
