use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Stable digest of an algorithm configuration (§3, §4.2).
///
/// The config is first canonicalised — object keys sorted recursively —
/// then hashed with SHA-256, truncated to a 16 byte-hex (64 bit) prefix.
/// Canonicalisation is what makes the hash stable across serialisers that
/// may otherwise preserve insertion order differently.
pub fn config_hash(config: &Value) -> String {
    let canonical = canonicalize(config);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

fn canonicalize(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            let entries: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| format!("{}:{}", serde_json::to_string(k).unwrap(), canonicalize(v)))
                .collect();
            format!("{{{}}}", entries.join(","))
        }
        Value::Array(items) => {
            let entries: Vec<String> = items.iter().map(canonicalize).collect();
            format!("[{}]", entries.join(","))
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_affect_digest() {
        let a = json!({"buy": 1.2, "sell": -1.2, "nested": {"x": 1, "y": 2}});
        let b = json!({"nested": {"y": 2, "x": 1}, "sell": -1.2, "buy": 1.2});
        assert_eq!(config_hash(&a), config_hash(&b));
    }

    #[test]
    fn different_values_produce_different_digests() {
        let a = json!({"buy": 1.2});
        let b = json!({"buy": 1.3});
        assert_ne!(config_hash(&a), config_hash(&b));
    }

    #[test]
    fn digest_is_stable_length() {
        let hash = config_hash(&json!({"a": 1}));
        assert_eq!(hash.len(), 16);
    }
}
