//! # Merge patches
//!
//! RFC 7386 helpers. [`merge_patch_diff`] computes the patch that turns one
//! document into another; [`apply_merge_patch`] applies one in place.

use serde_json::{Map, Value};

/// Compute the merge patch that transforms `before` into `after`
///
/// Keys removed in `after` become `null`. Arrays and scalars are replaced
/// wholesale, as RFC 7386 has no array diffing.
#[must_use]
pub fn merge_patch_diff(before: &Value, after: &Value) -> Value {
    match (before, after) {
        (Value::Object(b), Value::Object(a)) => {
            let mut patch = Map::new();
            for (key, after_value) in a {
                match b.get(key) {
                    Some(before_value) if before_value == after_value => {}
                    Some(before_value @ Value::Object(_)) if after_value.is_object() => {
                        patch.insert(key.clone(), merge_patch_diff(before_value, after_value));
                    }
                    _ => {
                        patch.insert(key.clone(), after_value.clone());
                    }
                }
            }
            for key in b.keys() {
                if !a.contains_key(key) {
                    patch.insert(key.clone(), Value::Null);
                }
            }
            Value::Object(patch)
        }
        _ => after.clone(),
    }
}

/// Apply an RFC 7386 merge patch to `target`
pub fn apply_merge_patch(target: &mut Value, patch: &Value) {
    json_patch::merge(target, patch);
}

/// Whether every field set in `subset` has the same value in `superset`
///
/// Objects recurse; arrays must have equal length and match element-wise.
/// Used to compare a desired object against one the API server has defaulted.
#[must_use]
pub fn json_is_subset(subset: &Value, superset: &Value) -> bool {
    match (subset, superset) {
        (Value::Object(sub), Value::Object(sup)) => sub.iter().all(|(key, value)| {
            match sup.get(key) {
                Some(other) => json_is_subset(value, other),
                None => value.is_null(),
            }
        }),
        (Value::Array(sub), Value::Array(sup)) => {
            sub.len() == sup.len() && sub.iter().zip(sup).all(|(a, b)| json_is_subset(a, b))
        }
        (Value::Null, _) => true,
        _ => subset == superset,
    }
}
