//! Sync protocol message types.
//!
//! Every message between contexts is an [`Envelope`]. There are three kinds:
//!
//! ```text
//! Owner (background)                    Consumer (panel)
//!   |<------- StateRequest(token) --------|
//!   |-------- StateResponse(token) ------>|
//!   |                                     |
//!   |-------- ChangeNotification -------->|   (unsolicited, no data)
//!   |<------- StateRequest(token') -------|
//!   |-------- StateResponse(token') ----->|
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use storelink_core::{StateValue, StoreName};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 0;

/// Message size limits.
pub mod limits {
    /// Default upper bound for one encoded envelope.
    pub const DEFAULT_MAX_ENVELOPE_BYTES: usize = 4 * 1024 * 1024;
}

/// Identifier linking a request to its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorrelationToken(pub u64);

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What an envelope means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// The owning store changed. Carries no data.
    ChangeNotification,
    /// Ask the owner for a full snapshot.
    StateRequest,
    /// Full snapshot answering a request.
    StateResponse,
}

impl MessageType {
    /// Check if the sender of this type waits for a reply.
    pub fn expects_reply(self) -> bool {
        matches!(self, MessageType::StateRequest)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageType::ChangeNotification => "change-notification",
            MessageType::StateRequest => "state-request",
            MessageType::StateResponse => "state-response",
        };
        f.write_str(s)
    }
}

/// One message unit exchanged between contexts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Wire protocol version.
    pub protocol_version: u8,
    /// What this envelope means.
    pub message_type: MessageType,
    /// Which store it is about.
    pub store: StoreName,
    /// Full snapshot (responses only).
    ///
    /// Omitted when absent, so that a null snapshot stays distinguishable
    /// from no snapshot on the wire.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_payload"
    )]
    pub payload: Option<StateValue>,
    /// Request/response correlation (requests and responses only).
    pub token: Option<CorrelationToken>,
    /// Owner-side mutation counter at the time of sending (notifications
    /// and responses).
    pub version: Option<u64>,
}

fn present_payload<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<StateValue>, D::Error> {
    StateValue::deserialize(deserializer).map(Some)
}

impl Envelope {
    /// An unsolicited "store changed" push.
    pub fn change_notification(store: StoreName, version: u64) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            message_type: MessageType::ChangeNotification,
            store,
            payload: None,
            token: None,
            version: Some(version),
        }
    }

    /// Ask for the current snapshot of a store.
    pub fn state_request(store: StoreName, token: CorrelationToken) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            message_type: MessageType::StateRequest,
            store,
            payload: None,
            token: Some(token),
            version: None,
        }
    }

    /// Answer a request with a full snapshot.
    pub fn state_response(
        store: StoreName,
        token: CorrelationToken,
        payload: StateValue,
        version: u64,
    ) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            message_type: MessageType::StateResponse,
            store,
            payload: Some(payload),
            token: Some(token),
            version: Some(version),
        }
    }

    /// Check the structural rules for this message type.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.protocol_version != PROTOCOL_VERSION {
            return Err("unsupported protocol version");
        }
        match self.message_type {
            MessageType::ChangeNotification => {
                if self.token.is_some() {
                    return Err("change notification must not carry a token");
                }
                if self.payload.is_some() {
                    return Err("change notification must not carry a payload");
                }
            }
            MessageType::StateRequest => {
                if self.token.is_none() {
                    return Err("state request requires a token");
                }
                if self.payload.is_some() {
                    return Err("state request must not carry a payload");
                }
            }
            MessageType::StateResponse => {
                if self.token.is_none() {
                    return Err("state response requires a token");
                }
                if self.payload.is_none() {
                    return Err("state response requires a payload");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_are_valid() {
        let token = CorrelationToken(7);
        assert!(Envelope::change_notification(StoreName::Tab, 3)
            .validate()
            .is_ok());
        assert!(Envelope::state_request(StoreName::Tab, token).validate().is_ok());
        assert!(
            Envelope::state_response(StoreName::Tab, token, StateValue::null(), 3)
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_notification_with_token_rejected() {
        let mut envelope = Envelope::change_notification(StoreName::Tab, 1);
        envelope.token = Some(CorrelationToken(1));
        assert!(envelope.validate().is_err());
    }

    #[test]
    fn test_response_without_payload_rejected() {
        let mut envelope =
            Envelope::state_response(StoreName::Tab, CorrelationToken(1), StateValue::null(), 0);
        envelope.payload = None;
        assert!(envelope.validate().is_err());
    }

    #[test]
    fn test_request_without_token_rejected() {
        let mut envelope = Envelope::state_request(StoreName::Tab, CorrelationToken(1));
        envelope.token = None;
        assert!(envelope.validate().is_err());
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut envelope = Envelope::change_notification(StoreName::Tab, 1);
        envelope.protocol_version = PROTOCOL_VERSION + 1;
        assert!(envelope.validate().is_err());
    }

    #[test]
    fn test_only_requests_expect_reply() {
        assert!(MessageType::StateRequest.expects_reply());
        assert!(!MessageType::StateResponse.expects_reply());
        assert!(!MessageType::ChangeNotification.expects_reply());
    }
}
