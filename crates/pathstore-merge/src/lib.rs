//! Merge engine for pathstore partial updates.
//!
//! Implements the one merge rule every `combine` relies on: a right-biased,
//! object-only deep merge.
//!
//! - A non-object `incoming` (null, array, scalar) replaces `base` outright.
//!   Arrays are never concatenated or spliced.
//! - An object `incoming` is laid over a copy of `base` (or `{}` when `base`
//!   is not an object). Where both sides hold an object under the same key the
//!   two are merged recursively; every other key from `incoming` overwrites.
//! - Keys present only in `base` survive unchanged.
//!
//! ```
//! use pathstore_merge::merge;
//! use serde_json::json;
//!
//! let merged = merge(&json!({"score": 10}), &json!({"members": ["x"]}));
//! assert_eq!(merged, json!({"score": 10, "members": ["x"]}));
//! ```

use serde_json::{Map, Value};

/// Merge `incoming` over `base`, returning a new value.
pub fn merge(base: &Value, incoming: &Value) -> Value {
    let mut out = base.clone();
    merge_into(&mut out, incoming);
    out
}

/// Merge `incoming` over `base` in place.
pub fn merge_into(base: &mut Value, incoming: &Value) {
    let Value::Object(patch) = incoming else {
        *base = incoming.clone();
        return;
    };

    if !base.is_object() {
        *base = Value::Object(Map::new());
    }
    let Value::Object(target) = base else {
        return;
    };

    for (key, value) in patch {
        match target.get_mut(key) {
            Some(existing) if existing.is_object() && value.is_object() => {
                merge_into(existing, value);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}
