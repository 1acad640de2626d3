//! # Storelink Testkit
//!
//! Testing utilities for storelink.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Generators**: Proptest strategies for store names, state values and envelopes
//! - **Fixtures**: An in-memory network with background and panel contexts,
//!   and counter stores to put on it
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use storelink_testkit::generators::{state_value, store_name};
//!
//! proptest! {
//!     #[test]
//!     fn digest_is_deterministic(store in store_name(), state in state_value()) {
//!         let d1 = storelink_core::state_digest(store, &state).unwrap();
//!         let d2 = storelink_core::state_digest(store, &state).unwrap();
//!         prop_assert_eq!(d1, d2);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use storelink_core::StoreName;
//! use storelink_testkit::fixtures::{counter_registry, Counter};
//!
//! let registry = counter_registry(&[StoreName::Tab]);
//! assert_eq!(registry.len(), 1);
//! assert_eq!(Counter::new(1).count, 1);
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{counter_registry, fast_config, init_tracing, Counter, TestNetwork};
pub use generators::{envelope, state_value, store_name};
