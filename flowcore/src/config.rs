use serde::de::DeserializeOwned;
use std::path::Path;
use thiserror::Error;

/// Errors loading a worker's JSON configuration document (§9 "Dynamic
/// dictionaries for configuration ... a single canonical JSON/YAML parse at
/// process start"). Only JSON is implemented — the §1 non-goal excludes
/// parsing arbitrary YAML nested maps, not config loading itself.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, source: std::io::Error },

    #[error("failed to parse config file {path} as JSON: {source}")]
    Parse { path: String, source: serde_json::Error },
}

/// Load and deserialize a `serde`-derived config struct from a JSON file at
/// process start. Every worker binary calls this exactly once; the loaded
/// value (or the subset of it each component calls "algorithm-relevant") is
/// what feeds `config_hash` (§4.2, §9).
pub fn load_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let path_ref = path.as_ref();
    let contents = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
        path: path_ref.display().to_string(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ConfigError::Parse { path: path_ref.display().to_string(), source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Example {
        buy_threshold: f64,
    }

    #[test]
    fn loads_a_well_formed_json_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"buy_threshold": 1.2}"#).unwrap();
        let loaded: Example = load_config(&path).unwrap();
        assert_eq!(loaded, Example { buy_threshold: 1.2 });
    }

    #[test]
    fn surfaces_a_parse_error_for_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        let result: Result<Example, _> = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn surfaces_a_read_error_for_a_missing_file() {
        let result: Result<Example, _> = load_config("/nonexistent/path/config.json");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
