//! StoreLike: the read/subscribe contract every store exposes.
//!
//! UI code depends on this trait only, so it runs unmodified against an
//! authoritative [`LocalStore`](crate::LocalStore) or a remote proxy.

use serde::de::DeserializeOwned;
use storelink_core::{StateValue, StoreName};

use crate::error::Result;
use crate::listeners::{Listener, ListenerId};

/// Read/subscribe contract shared by local stores and proxies.
pub trait StoreLike: Send + Sync {
    /// The store's identity.
    fn id(&self) -> StoreName;

    /// Current state.
    ///
    /// A local store always returns `Some`. A proxy returns `None` until the
    /// first snapshot has been applied, and never returns to `None` after.
    fn state(&self) -> Option<StateValue>;

    /// Register a listener invoked after every state change.
    fn add_changed_listener(&self, listener: Listener) -> ListenerId;

    /// Remove a registration. Returns false if it was already gone.
    fn remove_changed_listener(&self, id: ListenerId) -> bool;
}

/// Typed access on top of [`StoreLike`].
pub trait StoreLikeExt: StoreLike {
    /// Decode the current state as `T`, or `None` while unset.
    fn state_as<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match self.state() {
            Some(state) => Ok(Some(state.decode()?)),
            None => Ok(None),
        }
    }
}

impl<S: StoreLike + ?Sized> StoreLikeExt for S {}
