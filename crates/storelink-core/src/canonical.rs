//! Canonical CBOR encoding of state values.
//!
//! Two contexts holding the same logical state must produce the same bytes,
//! so that digests can be compared without shipping the state itself.
//! Encoding rules (RFC 8949 core deterministic encoding, with one
//! simplification for floats):
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - Floats always encoded as 64-bit, NaN normalized to the quiet NaN

use ciborium::value::{Integer, Value};

use crate::error::{CoreError, Result};
use crate::state::StateValue;

/// Quiet NaN bit pattern used for every NaN.
const CANONICAL_NAN: u64 = 0x7ff8_0000_0000_0000;

/// Encode a state value to canonical bytes.
pub fn canonical_state_bytes(state: &StateValue) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, state.as_value())?;
    Ok(buf)
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => encode_array(buf, arr)?,
        Value::Map(entries) => encode_map_canonical(buf, entries)?,
        Value::Tag(tag, inner) => {
            encode_uint(buf, 6, *tag);
            encode_value_to(buf, inner)?;
        }
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Float(f) => encode_float(buf, *f),
        _ => {
            return Err(CoreError::Canonical("unsupported CBOR value type".into()));
        }
    }
    Ok(())
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = (-1 - n) as u64;
        encode_uint(buf, 1, abs);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a float as a 64-bit IEEE 754 value (major type 7).
fn encode_float(buf: &mut Vec<u8>, f: f64) {
    let bits = if f.is_nan() { CANONICAL_NAN } else { f.to_bits() };
    buf.push(0xfb);
    buf.extend_from_slice(&bits.to_be_bytes());
}

/// Encode a byte string (major type 2).
fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Encode a text string (major type 3).
fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode an array (major type 4).
fn encode_array(buf: &mut Vec<u8>, arr: &[Value]) -> Result<()> {
    encode_uint(buf, 4, arr.len() as u64);
    for item in arr {
        encode_value_to(buf, item)?;
    }
    Ok(())
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison. Duplicate keys are
/// rejected: two maps that differ only in which duplicate wins would
/// otherwise share a digest.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<()> {
    let mut pairs: Vec<(Vec<u8>, &Value)> = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key_buf = Vec::new();
        encode_value_to(&mut key_buf, k)?;
        pairs.push((key_buf, v));
    }

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    if pairs.windows(2).any(|w| w[0].0 == w[1].0) {
        return Err(CoreError::Canonical("duplicate map key".into()));
    }

    encode_uint(buf, 5, pairs.len() as u64);

    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn int(n: i64) -> Value {
        Value::Integer(n.into())
    }

    #[test]
    fn test_small_integers() {
        let bytes = canonical_state_bytes(&StateValue::from_value(int(5))).unwrap();
        assert_eq!(bytes, vec![0x05]);

        let bytes = canonical_state_bytes(&StateValue::from_value(int(-1))).unwrap();
        assert_eq!(bytes, vec![0x20]);

        let bytes = canonical_state_bytes(&StateValue::from_value(int(500))).unwrap();
        assert_eq!(bytes, vec![0x19, 0x01, 0xf4]);
    }

    #[test]
    fn test_map_key_order_independent() {
        let a = Value::Map(vec![(text("b"), int(2)), (text("a"), int(1))]);
        let b = Value::Map(vec![(text("a"), int(1)), (text("b"), int(2))]);

        let bytes_a = canonical_state_bytes(&StateValue::from_value(a)).unwrap();
        let bytes_b = canonical_state_bytes(&StateValue::from_value(b)).unwrap();
        assert_eq!(bytes_a, bytes_b);
        assert_eq!(bytes_a[0], 0xa2);
        // "a" sorts first
        assert_eq!(&bytes_a[1..3], &[0x61, b'a']);
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let map = Value::Map(vec![(text("a"), int(1)), (text("a"), int(2))]);
        let err = canonical_state_bytes(&StateValue::from_value(map)).unwrap_err();
        assert!(matches!(err, CoreError::Canonical(_)));
    }

    #[test]
    fn test_floats_fixed_width() {
        let bytes = canonical_state_bytes(&StateValue::from_value(Value::Float(1.5))).unwrap();
        assert_eq!(bytes.len(), 9);
        assert_eq!(bytes[0], 0xfb);

        let nan_a = canonical_state_bytes(&StateValue::from_value(Value::Float(f64::NAN))).unwrap();
        let nan_b =
            canonical_state_bytes(&StateValue::from_value(Value::Float(-f64::NAN))).unwrap();
        assert_eq!(nan_a, nan_b);
    }

    #[test]
    fn test_nested_structures() {
        let value = Value::Array(vec![
            Value::Null,
            Value::Bool(true),
            Value::Bytes(vec![1, 2]),
            Value::Tag(1, Box::new(int(0))),
        ]);
        let bytes = canonical_state_bytes(&StateValue::from_value(value)).unwrap();
        assert_eq!(bytes, vec![0x84, 0xf6, 0xf5, 0x42, 1, 2, 0xc1, 0x00]);
    }

    proptest! {
        #[test]
        fn test_map_order_never_matters(
            entries in prop::collection::btree_map("[a-z]{1,6}", any::<i64>(), 0..12)
        ) {
            let forward: Vec<(Value, Value)> =
                entries.iter().map(|(k, v)| (text(k), int(*v))).collect();
            let mut reversed = forward.clone();
            reversed.reverse();

            let a = canonical_state_bytes(&StateValue::from_value(Value::Map(forward))).unwrap();
            let b = canonical_state_bytes(&StateValue::from_value(Value::Map(reversed))).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
