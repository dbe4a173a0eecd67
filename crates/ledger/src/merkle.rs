//! Merkle root over canonically serialised records.
//!
//! Leaves are SHA-256 hex digests of each item's canonical JSON (object keys
//! sorted at every level).  Odd levels duplicate their last leaf; paired hex
//! strings are concatenated and rehashed until one root remains.

use std::fmt::Write as _;

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// SHA-256 of `data`, lowercase hex.
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    let digest = Sha256::digest(data.as_ref());
    digest.iter().fold(String::with_capacity(64), |mut acc, b| {
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

/// Serialise a JSON value with object keys sorted at every nesting level,
/// independent of how the value was built.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Plain JSON strings never fail to serialise.
                let _ = write!(out, "{}:", Value::String((*key).clone()));
                if let Some(inner) = map.get(*key) {
                    write_canonical(inner, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
}

/// Merkle root of a record batch.  Empty input hashes the empty byte string.
pub fn merkle_root<T: Serialize>(items: &[T]) -> Result<String> {
    if items.is_empty() {
        return Ok(sha256_hex(b""));
    }

    let mut level: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let value = serde_json::to_value(item)?;
        level.push(sha256_hex(canonical_json(&value)));
    }

    while level.len() > 1 {
        if level.len() % 2 == 1 {
            if let Some(last) = level.last().cloned() {
                level.push(last);
            }
        }
        level = level
            .chunks(2)
            .map(|pair| sha256_hex(format!("{}{}", pair[0], pair[1])))
            .collect();
    }

    Ok(level.swap_remove(0))
}
