//! # Storelink
//!
//! Keeps stores owned by one isolated context readable from every other
//! context, with no shared memory between them.
//!
//! ## Overview
//!
//! - **Stores**: authoritative state, owned by one context (usually the
//!   background), each with change listeners
//! - **Proxies**: read-only mirrors of those stores in other contexts,
//!   with the same read/subscribe contract
//! - **Sync**: consumers pull full snapshots; owners push a dirty signal
//!   after every mutation and consumers pull again
//!
//! ## Key Concepts
//!
//! - **Snapshot, not delta**: every response carries the whole state
//! - **Unset until populated**: a proxy has no value before its first
//!   response, distinct from any real state
//! - **Per-store independence**: stores are fetched concurrently and never
//!   ordered against each other
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use storelink::{ContextSession, StoreName};
//! use storelink::core::{ContextRole, StateValue};
//! use storelink::store::{LocalStore, StoreLike, StoreRegistry};
//! use storelink::sync::MemoryNetwork;
//!
//! async fn example() {
//!     let network = MemoryNetwork::new();
//!     let background = Arc::new(network.connect_new(ContextRole::Background).await);
//!     let panel = Arc::new(network.connect_new(ContextRole::Panel).await);
//!
//!     // Owner
//!     let registry = Arc::new(StoreRegistry::new());
//!     let tab = registry
//!         .register(LocalStore::new(StoreName::Tab, StateValue::null()))
//!         .unwrap();
//!     let _owner = ContextSession::builder(background).own(registry).start().unwrap();
//!
//!     // Consumer
//!     let consumer = ContextSession::builder(panel)
//!         .mirror(&[StoreName::Tab])
//!         .start()
//!         .unwrap();
//!     consumer.get_all_states().await.unwrap();
//!
//!     let proxy = consumer.proxy(StoreName::Tab).unwrap();
//!     proxy.add_changed_listener(Arc::new(|| println!("tab changed")));
//!     tab.set_state(StateValue::encode(&"example.com").unwrap());
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `storelink::core` - Store names, context addressing, state values
//! - `storelink::store` - Local stores, listeners, registries
//! - `storelink::sync` - Envelopes, dispatcher, proxies, channels

pub mod debug_tools;
pub mod error;
pub mod initializer;
pub mod session;

// Re-export component crates
pub use storelink_core as core;
pub use storelink_store as store;
pub use storelink_sync as sync;

// Re-export main types for convenience
pub use debug_tools::{DebugEntry, DebugSnapshot, DebugTools, StoreSide};
pub use error::{Error, Result};
pub use initializer::{initialize_consumer, initialize_owner, Flavor};
pub use session::{ContextSession, ContextSessionBuilder, SessionConfig};

pub use storelink_core::{StateValue, StoreName};
pub use storelink_sync::{ReconcilePolicy, SyncConfig};
