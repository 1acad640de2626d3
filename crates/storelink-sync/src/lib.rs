//! # Storelink Sync
//!
//! Protocol for mirroring stores owned by one isolated context into other
//! contexts that share no memory.
//!
//! ## Overview
//!
//! The owning context (usually the background) holds authoritative
//! [`LocalStore`](storelink_store::LocalStore)s. Consumer contexts (panels,
//! popups, content scripts) hold [`StoreProxy`]s. The two sides talk only
//! through [`Envelope`]s sent over a [`Channel`]:
//!
//! - consumers pull full snapshots with correlated `StateRequest`s
//! - owners push a data-less `ChangeNotification` after every mutation,
//!   and consumers answer it with a fresh pull
//!
//! ## Key Properties
//!
//! - **Fail fast**: envelopes are encoded before sending; nothing partial
//!   goes out
//! - **Independent stores**: no ordering or consistency across stores
//! - **Ordered per store**: notifications leave in mutation order
//! - **Leak-free**: abandoned requests remove themselves
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use storelink_core::{ContextRole, StoreName};
//! use storelink_sync::{Dispatcher, Endpoint, MemoryNetwork, Mirror, SyncConfig};
//!
//! async fn example() {
//!     let network = MemoryNetwork::new();
//!     let panel = Arc::new(network.connect_new(ContextRole::Panel).await);
//!
//!     let dispatcher = Arc::new(Dispatcher::new(panel, SyncConfig::default()));
//!     let mirror = Arc::new(Mirror::new(Arc::clone(&dispatcher), &[StoreName::Tab]));
//!     let _loop = Endpoint::new(dispatcher).with_mirror(Arc::clone(&mirror)).spawn();
//!
//!     let report = mirror.get_all_states().await;
//!     println!("{} stores fetched", report.succeeded.len());
//! }
//! ```

pub mod codec;
pub mod config;
pub mod convergence;
pub mod creator;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod messages;
pub mod mirror;
pub mod owner;
pub mod proxy;
pub mod transport;

pub use codec::{decode_envelope, encode_envelope};
pub use config::{ReconcilePolicy, SyncConfig};
pub use convergence::{verify_against, verify_convergence, ConvergenceResult};
pub use creator::{
    GetAllStatesReport, StoreActionMessageCreator, StoreActionMessageCreatorFactory,
    StoreActionMessageCreators,
};
pub use dispatcher::Dispatcher;
pub use endpoint::{Endpoint, EndpointReport};
pub use error::{Result, SyncError};
pub use messages::{limits, CorrelationToken, Envelope, MessageType, PROTOCOL_VERSION};
pub use mirror::Mirror;
pub use owner::{ChangeBroadcaster, Responder};
pub use proxy::{ApplyOutcome, StoreProxy};
pub use transport::{
    memory::MemoryChannel, memory::MemoryNetwork, Channel, DeliveryReport,
};
