//! Wire codec for envelopes.
//!
//! Envelopes cross the channel as CBOR bytes. Encoding happens before any
//! send, so a payload that cannot cross fails the caller immediately and
//! nothing partial reaches the channel.

use bytes::Bytes;

use crate::error::{Result, SyncError};
use crate::messages::Envelope;

/// Encode an envelope, enforcing structure and size.
pub fn encode_envelope(envelope: &Envelope, max_bytes: usize) -> Result<Bytes> {
    envelope
        .validate()
        .map_err(|reason| SyncError::Serialization(reason.into()))?;

    let mut buf = Vec::new();
    ciborium::into_writer(envelope, &mut buf)
        .map_err(|e| SyncError::Serialization(e.to_string()))?;

    if buf.len() > max_bytes {
        return Err(SyncError::Serialization(format!(
            "envelope for {} is {} bytes, limit is {}",
            envelope.store,
            buf.len(),
            max_bytes
        )));
    }

    Ok(Bytes::from(buf))
}

/// Decode and validate an envelope.
pub fn decode_envelope(bytes: &[u8]) -> Result<Envelope> {
    let envelope: Envelope =
        ciborium::from_reader(bytes).map_err(|e| SyncError::InvalidMessage(e.to_string()))?;
    envelope
        .validate()
        .map_err(|reason| SyncError::InvalidMessage(reason.into()))?;
    Ok(envelope)
}
