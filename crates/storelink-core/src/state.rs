//! Opaque state values.
//!
//! A [`StateValue`] is the snapshot a store hands across a context boundary.
//! The protocol never looks inside it; it only has to survive a lossless
//! round trip through the wire encoding, which is CBOR.

pub use ciborium::value::Value;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// A serializable snapshot of one store's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateValue(Value);

impl StateValue {
    /// Build a state value from any serializable type.
    ///
    /// Fails with [`CoreError::Serialization`] if the type refuses to
    /// serialize (for example a custom impl guarding a cyclic structure).
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Value::serialized(value)
            .map(Self)
            .map_err(|e| CoreError::Serialization(e.to_string()))
    }

    /// Read the state back as a concrete type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        self.0
            .deserialized()
            .map_err(|e| CoreError::Deserialization(e.to_string()))
    }

    /// The empty state.
    pub fn null() -> Self {
        Self(Value::Null)
    }

    /// Wrap a raw CBOR value.
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// Borrow the raw CBOR value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume into the raw CBOR value.
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Check whether this is the empty state.
    pub fn is_null(&self) -> bool {
        matches!(self.0, Value::Null)
    }
}

impl Default for StateValue {
    fn default() -> Self {
        Self::null()
    }
}

impl From<Value> for StateValue {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
