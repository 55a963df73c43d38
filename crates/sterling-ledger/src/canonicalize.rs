//! # RFC 8785 JSON Canonicalization Scheme (JCS)
//!
//! This module implements the JSON Canonicalization Scheme as defined in RFC 8785,
//! and layers domain-separated content hashing on top of it. Every hash-critical
//! artifact in the ledger (schemas, claims, operators, conflicts, packets, failures)
//! is hashed as `SHA256(prefix || canonical_json_bytes)`.
//!
//! ## Threat Model
//!
//! Canonicalization defends against:
//!
//! - **Key Reordering Attacks**: JSON objects have no inherent key order, allowing
//!   two semantically identical documents to produce different byte sequences.
//! - **Whitespace Manipulation**: Extra whitespace could produce different hashes
//!   for the same data.
//! - **Number Representation**: `1.0`, `1.00`, and `1` are equivalent but produce
//!   different byte sequences without normalization.
//! - **Domain confusion**: Without a prefix, a claim signature and an operator
//!   content hash computed over coincidentally identical bytes would collide.
//!
//! ## RFC 8785 Summary
//!
//! 1. **Object Keys**: Sorted lexicographically by UTF-16 code units.
//! 2. **Numbers**: Serialized with minimal representation (no trailing zeros).
//! 3. **Strings**: Minimal escaping (only required escapes).
//! 4. **Whitespace**: No insignificant whitespace.
//! 5. **Arrays**: Elements in original order.
//!
//! ## References
//!
//! - **RFC 8785** - "JSON Canonicalization Scheme (JCS)"
//!   <https://www.rfc-editor.org/rfc/rfc8785>

use crate::models::{CanonicalHashError, Hash};
use sha2::{Digest, Sha256};

/// Domain separation prefixes. Part of the preimage, never decorative.
pub mod prefix {
    pub const SCHEMA_CANON: &str = "schema_canon/v1:";
    pub const CLAIM_SIG: &str = "claim_sig/v1:";
    pub const OP_CANON: &str = "op_canon/v1:";
    pub const CONFLICT_CANON: &str = "conflict_canon/v1:";
    pub const PACKET_CANON: &str = "packet_canon/v1:";
    pub const FAILURE_CANON: &str = "failure_canon/v1:";
}

/// Canonicalizes a JSON value according to RFC 8785.
///
/// # Example
///
/// ```rust
/// use sterling_ledger::canonicalize::canonical_json_serialize;
/// use serde_json::json;
///
/// let value = json!({"zulu": true, "alpha": [3, 2, 1], "bravo": "test"});
/// assert_eq!(
///     canonical_json_serialize(&value),
///     r#"{"alpha":[3,2,1],"bravo":"test","zulu":true}"#
/// );
/// ```
pub fn canonical_json_serialize(value: &serde_json::Value) -> String {
    canonicalize_value(value)
}

/// Computes `SHA256(prefix || canonical_json_serialize(value))` as a lowercase hex string.
///
/// `prefix` is prepended to the serialized bytes before hashing so that artifacts of
/// different kinds never collide even if their canonical bodies happen to match.
pub fn canonical_json_hash(value: &serde_json::Value, prefix: &str) -> String {
    let canonical = canonical_json_serialize(value);
    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Computes the raw 32-byte digest, for callers that want bytes rather than hex.
pub fn canonical_hash_bytes(value: &serde_json::Value, prefix: &str) -> Hash {
    let canonical = canonical_json_serialize(value);
    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(canonical.as_bytes());
    hasher.finalize().into()
}

/// Extracts a reduced mapping containing only allowlisted top-level paths from `value`.
///
/// `allowlist` is a set of dotted paths (e.g. `"slots.name"`); any path not present is
/// silently omitted (it is not an error for an optional field to be absent). Paths in
/// `denylist` are removed even if they matched the allowlist, so an allowlist can be
/// broad and a denylist can carve out run-local exceptions. This is used to build the
/// ordered preimage dicts described in the component design sections rather than to
/// hash a value verbatim.
pub fn extract_semantic_payload(
    value: &serde_json::Value,
    allowlist: &[&str],
    denylist: &[&str],
) -> Result<serde_json::Value, CanonicalHashError> {
    let mut out = serde_json::Map::new();
    for path in allowlist {
        if denylist.contains(path) {
            continue;
        }
        if let Some(v) = lookup_path(value, path) {
            if !is_serializable(v) {
                return Err(CanonicalHashError::NonSerializable {
                    path: (*path).to_string(),
                });
            }
            insert_path(&mut out, path, v.clone());
        }
    }
    Ok(serde_json::Value::Object(out))
}

/// Composes [`extract_semantic_payload`] and [`canonical_json_hash`].
pub fn compute_semantic_hash(
    value: &serde_json::Value,
    allowlist: &[&str],
    prefix: &str,
) -> Result<String, CanonicalHashError> {
    let payload = extract_semantic_payload(value, allowlist, &[])?;
    Ok(canonical_json_hash(&payload, prefix))
}

/// A `null` at a hash-critical path is ambiguous with the path being absent
/// entirely (`extract_semantic_payload` already omits absent paths silently),
/// so it is rejected rather than hashed as `null`. This is the usual shape an
/// optional field takes when a caller forgets to omit it outright (e.g. a
/// `#[serde(skip)]` escape hatch that serializes to `null` instead of
/// vanishing), so treating it as non-serializable fails hard instead of
/// silently baking an ambiguous value into the hash.
fn is_serializable(value: &serde_json::Value) -> bool {
    !value.is_null()
}

fn lookup_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn insert_path(map: &mut serde_json::Map<String, serde_json::Value>, path: &str, value: serde_json::Value) {
    let mut segments = path.split('.').peekable();
    let mut current = map;
    while let Some(seg) = segments.next() {
        if segments.peek().is_none() {
            current.insert(seg.to_string(), value);
            return;
        }
        let entry = current
            .entry(seg.to_string())
            .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
        current = entry.as_object_mut().expect("intermediate path segment is always an object");
    }
}

fn canonicalize_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(b) => {
            if *b {
                "true".to_string()
            } else {
                "false".to_string()
            }
        }
        serde_json::Value::Number(n) => canonicalize_number(n),
        serde_json::Value::String(s) => canonicalize_string(s),
        serde_json::Value::Array(arr) => canonicalize_array(arr),
        serde_json::Value::Object(obj) => canonicalize_object(obj),
    }
}

fn canonicalize_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    if let Some(f) = n.as_f64() {
        if f.fract() == 0.0 && f.abs() < (i64::MAX as f64) {
            return (f as i64).to_string();
        }
        format_float(f)
    } else {
        n.to_string()
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() || f.is_infinite() {
        return "null".to_string();
    }
    format!("{}", f)
}

fn canonicalize_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    result.push('"');
    for ch in s.chars() {
        match ch {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\x08' => result.push_str("\\b"),
            '\x0C' => result.push_str("\\f"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c < '\x20' => result.push_str(&format!("\\u{:04x}", c as u32)),
            c => result.push(c),
        }
    }
    result.push('"');
    result
}

fn canonicalize_array(arr: &[serde_json::Value]) -> String {
    let elements: Vec<String> = arr.iter().map(canonicalize_value).collect();
    format!("[{}]", elements.join(","))
}

fn canonicalize_object(obj: &serde_json::Map<String, serde_json::Value>) -> String {
    let mut entries: Vec<(&String, &serde_json::Value)> = obj.iter().collect();
    entries.sort_by(|(a, _), (b, _)| compare_utf16(a, b));
    let pairs: Vec<String> = entries
        .iter()
        .map(|(k, v)| format!("{}:{}", canonicalize_string(k), canonicalize_value(v)))
        .collect();
    format!("{{{}}}", pairs.join(","))
}

/// Compares two strings by their UTF-16 code unit sequences (RFC 8785 §3.2.3).
fn compare_utf16(a: &str, b: &str) -> std::cmp::Ordering {
    let a_utf16: Vec<u16> = a.encode_utf16().collect();
    let b_utf16: Vec<u16> = b.encode_utf16().collect();
    a_utf16.cmp(&b_utf16)
}

/// Minimal hex encoding so this crate does not need the `hex` crate for 32-byte digests.
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        let bytes = bytes.as_ref();
        let mut s = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            s.push_str(&format!("{:02x}", b));
        }
        s
    }
}
