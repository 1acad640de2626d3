//! # Storelink Core
//!
//! Pure primitives for storelink: store identities, context addressing,
//! opaque state values and their canonical digests.
//!
//! This crate contains no I/O and no async. Everything that crosses a
//! context boundary is built from the types defined here.
//!
//! ## Key Types
//!
//! - [`StoreName`] - Closed set of store identities, the routing key for all messages
//! - [`ContextId`] - Identity of one isolated execution context
//! - [`ContextRole`] - What kind of context a [`ContextId`] belongs to
//! - [`DestinationSelector`] - Which contexts a message is addressed to
//! - [`StateValue`] - Opaque, serializable snapshot of a store's state
//! - [`Blake3Hash`] - Digest of a state value's canonical encoding
//!
//! ## Canonicalization
//!
//! State digests are computed over deterministic CBOR. See [`canonical`].

pub mod canonical;
pub mod digest;
pub mod error;
pub mod state;
pub mod types;

pub use canonical::canonical_state_bytes;
pub use digest::{state_digest, Blake3Hash};
pub use error::{CoreError, Result};
pub use state::StateValue;
pub use types::{ContextId, ContextRole, DestinationSelector, StoreName};
