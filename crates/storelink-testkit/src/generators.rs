//! Proptest generators for property-based testing.

use ciborium::value::Value;
use proptest::prelude::*;

use storelink_core::{StateValue, StoreName};
use storelink_sync::{CorrelationToken, Envelope};

/// Generate a store name.
pub fn store_name() -> impl Strategy<Value = StoreName> {
    prop::sample::select(StoreName::ALL.to_vec())
}

/// Generate a correlation token.
pub fn token() -> impl Strategy<Value = CorrelationToken> {
    any::<u64>().prop_map(CorrelationToken)
}

/// Generate a store version.
pub fn version() -> impl Strategy<Value = u64> {
    0u64..=1_000_000u64
}

/// Generate a CBOR value that survives a wire round trip unchanged.
///
/// Floats are finite: NaN never compares equal to itself.
pub fn cbor_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|i| Value::Integer(i.into())),
        (-1.0e9f64..1.0e9f64).prop_map(Value::Float),
        "[a-zA-Z0-9 ._-]{0,24}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(Value::Bytes),
    ];

    leaf.prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,8}", inner, 0..8).prop_map(|entries| {
                Value::Map(
                    entries
                        .into_iter()
                        .map(|(k, v)| (Value::Text(k), v))
                        .collect(),
                )
            }),
        ]
    })
}

/// Generate a state value.
pub fn state_value() -> impl Strategy<Value = StateValue> {
    cbor_value().prop_map(StateValue::from_value)
}

/// Generate any well-formed envelope.
pub fn envelope() -> impl Strategy<Value = Envelope> {
    prop_oneof![
        (store_name(), version()).prop_map(|(store, v)| Envelope::change_notification(store, v)),
        (store_name(), token()).prop_map(|(store, t)| Envelope::state_request(store, t)),
        (store_name(), token(), state_value(), version())
            .prop_map(|(store, t, state, v)| Envelope::state_response(store, t, state, v)),
    ]
}
