//! JSON sanitation for values written into the Task Store.
//!
//! The source (`_json_safe` in `fastapi_server.py`) exists to guarantee a
//! job record write never raises, even when fed duck-typed Python objects
//! that reference each other in a cycle. `serde_json::Value` is a tree —
//! genuine reference cycles can't be constructed through it, and
//! `Value::from(f64)` already maps NaN/infinite floats to `null` — so the
//! two hazards the source guards against structurally cannot occur here.
//!
//! What *can* still happen is a remote worker returning pathologically
//! deep nested JSON (attacker-controlled or buggy) that would blow the
//! stack during recursive serialization/merge. [`sanitize`] guards that
//! case by capping recursion depth and replacing anything past the cap
//! with the same `"<circular>"` sentinel the source uses, preserving the
//! "write never raises" guarantee in spirit even though the original
//! failure mode doesn't translate 1:1. See DESIGN.md's Open Question log.

use serde_json::Value;

const MAX_DEPTH: usize = 64;
const CIRCULAR_SENTINEL: &str = "<circular>";

/// Recursively re-validate a JSON value, capping nesting depth.
pub fn sanitize(value: Value) -> Value {
    sanitize_at(value, 0)
}

fn sanitize_at(value: Value, depth: usize) -> Value {
    if depth >= MAX_DEPTH {
        return Value::String(CIRCULAR_SENTINEL.to_string());
    }
    match value {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| sanitize_at(item, depth + 1))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, item)| (key, sanitize_at(item, depth + 1)))
                .collect(),
        ),
        other => other,
    }
}

/// Serialize `value` and sanitize the result, matching `JobStore.write`'s
/// `_json_safe(job)` call in the original source.
pub fn to_sanitized_value<T: serde::Serialize>(value: &T) -> serde_json::Result<Value> {
    Ok(sanitize(serde_json::to_value(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shallow_values_pass_through_unchanged() {
        let value = json!({ "a": [1, 2, 3], "b": "hello" });
        assert_eq!(sanitize(value.clone()), value);
    }

    #[test]
    fn pathologically_deep_nesting_is_capped() {
        let mut value = json!("leaf");
        for _ in 0..(MAX_DEPTH + 10) {
            value = json!([value]);
        }
        let sanitized = sanitize(value);
        // Walk down until we hit the sentinel; it must appear before we
        // run out of array wrappers.
        let mut cur = &sanitized;
        let mut found = false;
        for _ in 0..(MAX_DEPTH + 10) {
            match cur {
                Value::Array(items) if !items.is_empty() => cur = &items[0],
                Value::String(s) if s == CIRCULAR_SENTINEL => {
                    found = true;
                    break;
                }
                _ => break,
            }
        }
        assert!(found, "expected circular sentinel within depth cap");
    }

    #[test]
    fn nan_like_floats_never_reach_sanitize_as_nan() {
        // serde_json maps non-finite f64 to null at construction time,
        // so this can never observe a NaN Value in the first place.
        let value = Value::from(f64::NAN);
        assert_eq!(value, Value::Null);
        assert_eq!(sanitize(value), Value::Null);
    }
}
