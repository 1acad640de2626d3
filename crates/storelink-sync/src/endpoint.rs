//! Per-context receive loop.
//!
//! Every context runs exactly one endpoint on its channel. Inbound
//! envelopes are handled one at a time in arrival order:
//!
//! - `StateRequest` → the [`Responder`], if this context owns stores
//! - `StateResponse` → [`Dispatcher::resolve`], waking the waiting request
//! - `ChangeNotification` → the [`Mirror`], which starts a refresh
//!
//! Anything undecodable, unmatched, or addressed to a store this context
//! does not know is logged and dropped. Nothing here is fatal to the loop.

use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinHandle;

use storelink_core::ContextId;

use crate::codec::decode_envelope;
use crate::dispatcher::Dispatcher;
use crate::error::{Result, SyncError};
use crate::messages::MessageType;
use crate::mirror::Mirror;
use crate::owner::Responder;
use crate::transport::Channel;

/// Counters reported when the loop exits.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EndpointReport {
    /// Envelopes handled successfully.
    pub handled: usize,
    /// Envelopes dropped (undecodable, unknown store, unmatched).
    pub dropped: usize,
}

/// Receive loop for one context.
pub struct Endpoint<C: Channel> {
    dispatcher: Arc<Dispatcher<C>>,
    responder: Option<Responder<C>>,
    mirror: Option<Arc<Mirror<C>>>,
}

impl<C: Channel + 'static> Endpoint<C> {
    /// Create an endpoint that only resolves responses.
    pub fn new(dispatcher: Arc<Dispatcher<C>>) -> Self {
        Self {
            dispatcher,
            responder: None,
            mirror: None,
        }
    }

    /// Answer state requests (owner role).
    pub fn with_responder(mut self, responder: Responder<C>) -> Self {
        self.responder = Some(responder);
        self
    }

    /// Route change notifications to a mirror (consumer role).
    pub fn with_mirror(mut self, mirror: Arc<Mirror<C>>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Handle one inbound message.
    pub async fn handle(&self, from: ContextId, bytes: &Bytes) -> Result<()> {
        let envelope = decode_envelope(bytes)?;

        match envelope.message_type {
            MessageType::StateRequest => {
                let responder = self
                    .responder
                    .as_ref()
                    .ok_or(SyncError::UnknownStoreId(envelope.store))?;
                let report = responder.handle_request(from, &envelope).await?;
                if !report.any_delivered() {
                    return Err(SyncError::Unreachable(format!(
                        "response for {} to {}",
                        envelope.store, from
                    )));
                }
                Ok(())
            }
            MessageType::StateResponse => {
                let store = envelope.store;
                let token = envelope.token;
                if self.dispatcher.resolve(envelope) {
                    Ok(())
                } else {
                    Err(SyncError::InvalidMessage(format!(
                        "unmatched response for {store} (token {token:?})"
                    )))
                }
            }
            MessageType::ChangeNotification => {
                let mirror = self
                    .mirror
                    .as_ref()
                    .ok_or(SyncError::UnknownStoreId(envelope.store))?;
                mirror.handle_notification(&envelope)?;
                Ok(())
            }
        }
    }

    /// Run until the channel closes.
    pub async fn run(self) -> EndpointReport {
        let channel = Arc::clone(self.dispatcher.channel());
        let local = channel.local_context_id();
        let mut report = EndpointReport::default();

        loop {
            let (from, bytes) = match channel.recv().await {
                Ok(message) => message,
                Err(SyncError::ChannelClosed) => break,
                Err(e) => {
                    tracing::warn!(context = %local, error = %e, "receive failed");
                    break;
                }
            };

            match self.handle(from, &bytes).await {
                Ok(()) => report.handled += 1,
                Err(e @ SyncError::UnknownStoreId(_)) => {
                    tracing::debug!(context = %local, from = %from, error = %e, "dropped");
                    report.dropped += 1;
                }
                Err(e) => {
                    tracing::warn!(context = %local, from = %from, error = %e, "dropped");
                    report.dropped += 1;
                }
            }
        }

        tracing::debug!(
            context = %local,
            handled = report.handled,
            dropped = report.dropped,
            "endpoint stopped"
        );
        report
    }

    /// Run the loop on the tokio runtime.
    pub fn spawn(self) -> JoinHandle<EndpointReport> {
        tokio::spawn(self.run())
    }
}
