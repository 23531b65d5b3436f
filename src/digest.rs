//! Deterministic content digests
//!
//! Derived identifiers for un-keyed repeating elements and external records
//! are content-addressed: a SHA-256 digest over a canonical serialization of
//! the value, prefixed with the field path that produced it. Canonical form
//! writes object keys in sorted order so that key order in the source JSON
//! never affects identity.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Digest a value together with the path that produced it.
///
/// Two entries at different paths always differ; two entries at one path
/// differ exactly when their canonical content differs.
#[must_use]
pub fn path_content_digest(path: &str, value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update([0u8]);
    let mut buf = Vec::new();
    write_canonical(value, &mut buf);
    hasher.update(&buf);
    hex::encode(hasher.finalize())
}

/// Digest a bare value with no path component.
#[must_use]
pub fn content_digest(value: &Value) -> String {
    let mut hasher = Sha256::new();
    let mut buf = Vec::new();
    write_canonical(value, &mut buf);
    hasher.update(&buf);
    hex::encode(hasher.finalize())
}

/// Digest an arbitrary string key (URLs, external identifiers).
#[must_use]
pub fn string_digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Write a canonical, key-order-stable serialization of `value`.
///
/// Matches JSON syntax but sorts object keys; numbers use serde_json's
/// display form so integer and float identities are preserved.
fn write_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Value::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => {
            // serde_json escaping keeps the canonical form valid JSON
            out.extend_from_slice(
                serde_json::to_string(s).unwrap_or_default().as_bytes(),
            );
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                out.extend_from_slice(
                    serde_json::to_string(key).unwrap_or_default().as_bytes(),
                );
                out.push(b':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push(b'}');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_does_not_affect_digest() {
        let a: Value = serde_json::from_str(r#"{"a": 1, "b": [1, 2], "c": {"x": true}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"c": {"x": true}, "b": [1, 2], "a": 1}"#).unwrap();
        assert_eq!(content_digest(&a), content_digest(&b));
    }

    #[test]
    fn test_content_change_changes_digest() {
        let a = json!({"text": "hello"});
        let b = json!({"text": "goodbye"});
        assert_ne!(content_digest(&a), content_digest(&b));
    }

    #[test]
    fn test_path_changes_digest() {
        let value = json!({"text": "hello"});
        assert_ne!(
            path_content_digest("page.data.body", &value),
            path_content_digest("page.data.footer", &value)
        );
    }

    #[test]
    fn test_array_order_matters() {
        assert_ne!(
            content_digest(&json!([1, 2, 3])),
            content_digest(&json!([3, 2, 1]))
        );
    }

    #[test]
    fn test_digest_is_stable() {
        let value = json!({"n": 42});
        assert_eq!(content_digest(&value), content_digest(&value));
    }
}
