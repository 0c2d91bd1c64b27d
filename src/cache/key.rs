//! Cache key derivation.
//!
//! A key is a pure function of (calculator id, inputs, context). Inputs are
//! canonicalized by sorting object keys alphabetically at every nesting
//! level — array element order is semantically meaningful and preserved —
//! so two maps with the same content always derive the same key regardless
//! of enumeration order. The canonical payload is hashed, which keeps keys
//! bounded and lets `clear_prefix` target one calculator.

use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::domain::InputMap;

/// Key namespace; bump when the canonical form changes.
const KEY_PREFIX: &str = "calc:v1";

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache key canonicalization failed: {detail}")]
    Canonicalize { detail: String },
}

impl CacheError {
    fn canonicalize(detail: impl Into<String>) -> Self {
        Self::Canonicalize {
            detail: detail.into(),
        }
    }
}

/// Derive the cache key for one calculation.
pub fn encode(
    calculator_id: &str,
    inputs: &InputMap,
    context: Option<&Value>,
) -> Result<String, CacheError> {
    let payload = canonical_payload(calculator_id, inputs, context)?;
    let digest = Sha256::digest(payload.as_bytes());
    Ok(format!(
        "{KEY_PREFIX}:{calculator_id}:{}",
        hex::encode(digest)
    ))
}

/// Key prefix covering every entry of one calculator, for `clear_prefix`.
pub fn calculator_prefix(calculator_id: &str) -> String {
    format!("{KEY_PREFIX}:{calculator_id}:")
}

/// The canonical pre-hash payload. Exposed for tests and debugging.
pub fn canonical_payload(
    calculator_id: &str,
    inputs: &InputMap,
    context: Option<&Value>,
) -> Result<String, CacheError> {
    let mut out = String::with_capacity(64);
    out.push_str("{\"calculator\":");
    write_scalar(&Value::String(calculator_id.to_string()), &mut out)?;
    out.push_str(",\"context\":");
    match context {
        Some(value) => write_canonical(value, &mut out)?,
        None => out.push_str("null"),
    }
    out.push_str(",\"inputs\":");
    write_canonical(&Value::Object(inputs.clone()), &mut out)?;
    out.push('}');
    Ok(out)
}

/// Serialize a value with object keys sorted at every nesting level.
///
/// Total over well-formed JSON values; serializer failures propagate as
/// `CacheError` rather than producing a truncated key.
fn write_canonical(value: &Value, out: &mut String) -> Result<(), CacheError> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (index, key) in keys.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_scalar(&Value::String((*key).clone()), out)?;
                out.push(':');
                // key came from the map, lookup cannot miss
                if let Some(inner) = map.get(key.as_str()) {
                    write_canonical(inner, out)?;
                }
            }
            out.push('}');
            Ok(())
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
            Ok(())
        }
        scalar => write_scalar(scalar, out),
    }
}

fn write_scalar(value: &Value, out: &mut String) -> Result<(), CacheError> {
    let rendered =
        serde_json::to_string(value).map_err(|err| CacheError::canonicalize(err.to_string()))?;
    out.push_str(&rendered);
    Ok(())
}
