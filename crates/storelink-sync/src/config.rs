//! Configuration for sync behavior.

use std::time::Duration;

use storelink_core::DestinationSelector;

use crate::messages::limits;

/// How a proxy reconciles snapshots that arrive out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcilePolicy {
    /// The most recently received snapshot wins, whatever its version.
    ///
    /// A response that was in flight when a newer one arrived can
    /// overwrite the newer one.
    #[default]
    LastArrivalWins,
    /// A snapshot older than the one already applied is discarded.
    ///
    /// Uses the owner's per-store version carried in every response.
    HighestVersionWins,
}

/// Configuration for dispatch and reconciliation.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How long a state request waits for its response.
    pub request_timeout: Duration,
    /// Upper bound on one encoded envelope.
    pub max_envelope_bytes: usize,
    /// Proxy reconciliation policy.
    pub reconcile: ReconcilePolicy,
    /// Where state requests are sent.
    pub owner_destination: DestinationSelector,
    /// Where change notifications are pushed.
    pub notify_destination: DestinationSelector,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            max_envelope_bytes: limits::DEFAULT_MAX_ENVELOPE_BYTES,
            reconcile: ReconcilePolicy::default(),
            owner_destination: DestinationSelector::background(),
            notify_destination: DestinationSelector::All,
        }
    }
}

impl SyncConfig {
    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the reconcile policy.
    pub fn with_reconcile(mut self, policy: ReconcilePolicy) -> Self {
        self.reconcile = policy;
        self
    }

    /// Set the envelope size limit.
    pub fn with_max_envelope_bytes(mut self, max: usize) -> Self {
        self.max_envelope_bytes = max;
        self
    }

    /// Set where state requests go.
    pub fn with_owner_destination(mut self, destination: DestinationSelector) -> Self {
        self.owner_destination = destination;
        self
    }

    /// Set where change notifications go.
    pub fn with_notify_destination(mut self, destination: DestinationSelector) -> Self {
        self.notify_destination = destination;
        self
    }
}
