//! Canonical JSON serialization for reproducible artifacts
//!
//! Object keys are sorted recursively; array order is preserved, which keeps
//! the positional encoding contract intact. Artifacts written this way hash
//! identically across runs and platforms.

use serde::Serialize;
use serde_json::{ser::PrettyFormatter, Serializer, Value};
use std::collections::BTreeMap;

/// Recursively sort JSON object keys.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Compact canonical JSON (no whitespace); the form that gets hashed.
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let canonical = canonicalize(serde_json::to_value(value)?);
    serde_json::to_string(&canonical)
}

/// Indented canonical JSON for human-readable artifacts.
pub fn to_canonical_json_pretty<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let canonical = canonicalize(serde_json::to_value(value)?);
    let mut buffer = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"  "));
    canonical.serialize(&mut serializer)?;
    // serde_json only emits UTF-8
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// BLAKE3 of the compact canonical form, hex encoded.
pub fn hash_canonical_hex<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = to_canonical_json(value)?;
    Ok(hex::encode(blake3::hash(json.as_bytes()).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        zeta: Vec<&'static str>,
        alpha: i64,
    }

    #[test]
    fn sorts_keys_and_keeps_array_order() {
        let sample = Sample {
            zeta: vec!["b", "a"],
            alpha: 1,
        };
        let json = to_canonical_json(&sample).unwrap();
        assert_eq!(json, r#"{"alpha":1,"zeta":["b","a"]}"#);
    }

    #[test]
    fn pretty_form_parses_to_same_value() {
        let sample = Sample {
            zeta: vec!["x"],
            alpha: 7,
        };
        let compact: Value = serde_json::from_str(&to_canonical_json(&sample).unwrap()).unwrap();
        let pretty: Value =
            serde_json::from_str(&to_canonical_json_pretty(&sample).unwrap()).unwrap();
        assert_eq!(compact, pretty);
    }

    #[test]
    fn hash_is_stable() {
        let sample = Sample {
            zeta: vec!["b", "a"],
            alpha: 1,
        };
        let h1 = hash_canonical_hex(&sample).unwrap();
        let h2 = hash_canonical_hex(&sample).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }
}
