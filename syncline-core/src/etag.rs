//! Content addressing for conditional responses
//!
//! Computes a weak ETag from a response payload: the value is folded into
//! a canonical string (object keys sorted, array order preserved), then
//! into a 32-bit rolling hash. Two payloads that are structurally equal up
//! to object-key ordering always produce the same token.
//!
//! This is a checksum, not a cryptographic digest. Distinct payloads
//! collide with low but non-zero probability, which is acceptable for
//! cache validation and nothing else.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Recursion ceiling for canonical serialization. A `serde_json::Value`
/// tree cannot alias itself, so cycle detection reduces to this depth
/// guard; values nested deeper are replaced by the circular marker.
const MAX_DEPTH: usize = 128;

/// Marker emitted in place of a subtree that exceeds [`MAX_DEPTH`].
const CIRCULAR_MARKER: &str = "\"[Circular]\"";

// ============================================================================
// ETAG TOKEN
// ============================================================================

/// A weak validator token for a response body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ETag(String);

impl ETag {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare against the raw value of an `If-None-Match` header.
    pub fn matches(&self, if_none_match: &str) -> bool {
        self.0 == if_none_match.trim()
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// CANONICAL SERIALIZATION
// ============================================================================

/// Serialize a JSON value into its canonical form: object keys sorted
/// lexicographically, array element order preserved, scalars in serde_json
/// formatting.
pub fn stable_stringify(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, 0, &mut out);
    out
}

fn write_canonical(value: &Value, depth: usize, out: &mut String) {
    if depth > MAX_DEPTH {
        out.push_str(CIRCULAR_MARKER);
        return;
    }

    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => {
            // serde_json string serialization cannot fail
            out.push_str(&serde_json::to_string(s).unwrap_or_default());
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, depth + 1, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();

            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).unwrap_or_default());
                out.push(':');
                // maps are keyed by these exact keys, value must exist
                if let Some(child) = map.get(*key) {
                    write_canonical(child, depth + 1, out);
                }
            }
            out.push('}');
        }
    }
}

// ============================================================================
// WEAK ETAG COMPUTATION
// ============================================================================

/// Compute the weak ETag token for a payload.
///
/// The canonical string is folded into a 32-bit rolling hash
/// (`h = h * 31 + byte`, wrapping); the token combines the hash with the
/// serialized length to reduce collision risk:
/// `W/"<hash hex>-<length hex>"`.
pub fn weak_etag_from(value: &Value) -> ETag {
    let canonical = stable_stringify(value);
    let mut hash: u32 = 0;
    for byte in canonical.bytes() {
        hash = hash.wrapping_mul(31).wrapping_add(byte as u32);
    }
    ETag(format!("W/\"{:x}-{:x}\"", hash, canonical.len()))
}

// =============================================================================
// TESTS
// =============================================================================
