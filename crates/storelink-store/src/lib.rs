//! # Storelink Store
//!
//! The owning side of store synchronization: authoritative stores, their
//! change listeners, and an explicit registry of stores by name.
//!
//! ## Key Types
//!
//! - [`StoreLike`] - Read/subscribe contract shared by local stores and remote proxies
//! - [`LocalStore`] - Authoritative store owned by one context
//! - [`ListenerSet`] - Ordered, additive set of change listeners
//! - [`StoreRegistry`] - Explicit map of store name to local store
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use storelink_core::{StateValue, StoreName};
//! use storelink_store::{LocalStore, StoreLike, StoreRegistry};
//!
//! let registry = StoreRegistry::new();
//! let store = registry
//!     .register(LocalStore::new(StoreName::Tab, StateValue::null()))
//!     .unwrap();
//!
//! store.add_changed_listener(Arc::new(|| println!("tab store changed")));
//! store.set_state(StateValue::encode(&"example.com").unwrap());
//! assert_eq!(store.version(), 1);
//! ```
//!
//! ## Design Notes
//!
//! - **Dirty signal, not delta**: listeners receive no payload and must call
//!   [`StoreLike::state`] to read the new value
//! - **Ordered fan-out**: notifications for one store follow mutation order
//! - **No globals**: registries are values, so several sessions can coexist

pub mod error;
pub mod listeners;
pub mod local;
pub mod registry;
pub mod traits;

pub use error::{Result, StoreError};
pub use listeners::{Listener, ListenerId, ListenerSet};
pub use local::LocalStore;
pub use registry::{HookId, RegistrationHook, StoreRegistry};
pub use traits::{StoreLike, StoreLikeExt};
