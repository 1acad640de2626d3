//! State digests.
//!
//! A digest lets two contexts check that they hold the same snapshot
//! without moving the snapshot itself.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::canonical_state_bytes;
use crate::error::Result;
use crate::state::StateValue;
use crate::types::StoreName;

/// Domain separator for state digests.
const STATE_DOMAIN: &[u8] = b"storelink-state-v0:";

/// A 32-byte Blake3 hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blake3Hash(pub [u8; 32]);

impl Blake3Hash {
    /// Compute the Blake3 hash of the given data.
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blake3({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// Digest of one store's state.
///
/// H = Blake3(domain || store code || canonical_bytes(state))
pub fn state_digest(store: StoreName, state: &StateValue) -> Result<Blake3Hash> {
    let canonical = canonical_state_bytes(state)?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(STATE_DOMAIN);
    hasher.update(&store.to_u16().to_be_bytes());
    hasher.update(&canonical);

    Ok(Blake3Hash(*hasher.finalize().as_bytes()))
}
