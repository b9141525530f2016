//! Content hashing for event values.
//!
//! Values are hashed over their canonical JSON encoding. `serde_json::Map` keeps
//! keys sorted, so two structurally equal values always encode to the same bytes
//! regardless of how their objects were built.

use crate::error::HistoryError;
use crate::types::ValueHash;
use serde_json::Value;

/// Compute the content hash of a value (hex-encoded BLAKE3)
pub fn compute_value_hash(value: &Value) -> Result<ValueHash, HistoryError> {
    let mut hasher = blake3::Hasher::new();
    serde_json::to_writer(&mut hasher, value)
        .map_err(|e| HistoryError::Serialization(e.to_string()))?;
    Ok(hex::encode(hasher.finalize().as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Map};

    #[test]
    fn test_hash_is_hex_blake3() {
        let hash = compute_value_hash(&json!({"smoke": 60})).unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_structurally_equal_values_share_hash() {
        let a = json!({"coord": [30, 40], "smoke": 60});
        let b: Value = serde_json::from_str(r#"{"smoke": 60, "coord": [30, 40]}"#).unwrap();
        assert_eq!(
            compute_value_hash(&a).unwrap(),
            compute_value_hash(&b).unwrap()
        );
    }

    #[test]
    fn test_different_values_differ() {
        let a = compute_value_hash(&json!([1, 2])).unwrap();
        let b = compute_value_hash(&json!([2, 1])).unwrap();
        let c = compute_value_hash(&json!("[1,2]")).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    proptest! {
        #[test]
        fn prop_key_insertion_order_is_irrelevant(
            entries in proptest::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..16)
        ) {
            let mut forward = Map::new();
            for (k, v) in entries.iter() {
                forward.insert(k.clone(), json!(v));
            }
            let mut backward = Map::new();
            for (k, v) in entries.iter().rev() {
                backward.insert(k.clone(), json!(v));
            }
            prop_assert_eq!(
                compute_value_hash(&Value::Object(forward)).unwrap(),
                compute_value_hash(&Value::Object(backward)).unwrap()
            );
        }

        #[test]
        fn prop_hash_is_deterministic(text in ".*", number in any::<i32>(), flag in any::<bool>()) {
            let value = json!({"text": text, "number": number, "flag": flag});
            prop_assert_eq!(
                compute_value_hash(&value).unwrap(),
                compute_value_hash(&value.clone()).unwrap()
            );
        }
    }
}
