use crate::error::OrchestratorError;
use crate::worker::WorkerName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Per-run metadata consolidated across every supervised worker (§3
/// `RunManifest`, §6 `<root>/artifacts/run_logs/run_manifest_<run_id>.json`).
/// Created when the orchestrator resolves `run_id` and finalised once every
/// worker has exited (or been force-killed) during shutdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub started_ms: i64,
    pub ended_ms: Option<i64>,
    pub component_versions: BTreeMap<String, String>,
    pub config_digest: String,
    pub dq_summary: Option<serde_json::Value>,
    pub sink_counts: BTreeMap<String, u64>,
    pub parity_passed: Option<bool>,
    pub restarts: BTreeMap<WorkerName, u32>,
    pub no_signals: bool,
}

impl RunManifest {
    pub fn new(run_id: impl Into<String>, started_ms: i64, config_digest: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            started_ms,
            ended_ms: None,
            component_versions: BTreeMap::new(),
            config_digest: config_digest.into(),
            dq_summary: None,
            sink_counts: BTreeMap::new(),
            parity_passed: None,
            restarts: BTreeMap::new(),
            no_signals: false,
        }
    }

    pub fn finalize(&mut self, ended_ms: i64) {
        self.ended_ms = Some(ended_ms);
    }

    pub fn write(&self, root: impl AsRef<Path>) -> Result<(), OrchestratorError> {
        let dir = root.as_ref().join("artifacts").join("run_logs");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("run_manifest_{}.json", self.run_id));
        let contents = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Environment/provenance snapshot written once per run alongside
/// [`RunManifest`] (§4.5 "write source manifest (env snapshot, config
/// digest, git hash if available)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceManifest {
    pub run_id: String,
    pub env_snapshot: BTreeMap<String, String>,
    pub config_digest: String,
    pub git_hash: Option<String>,
}

/// Environment variables recognised by the pipeline (§6) worth snapshotting
/// for reproducibility; anything else in `std::env::vars()` is operator/CI
/// noise (`PATH`, `HOME`, …) not relevant to a run's provenance.
const SNAPSHOT_KEYS: [&str; 8] =
    ["RUN_ID", "TIMEZONE", "V13_REPLAY_MODE", "V13_SINK", "FSYNC_EVERY_N", "SQLITE_BATCH_N", "SQLITE_FLUSH_MS", "RULES_VER"];

impl SourceManifest {
    pub fn capture(run_id: impl Into<String>, config_digest: impl Into<String>) -> Self {
        let env_snapshot = SNAPSHOT_KEYS
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)))
            .collect();
        Self { run_id: run_id.into(), env_snapshot, config_digest: config_digest.into(), git_hash: git_hash() }
    }

    pub fn write(&self, root: impl AsRef<Path>) -> Result<(), OrchestratorError> {
        let dir = root.as_ref().join("artifacts").join("run_logs");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("source_manifest_{}.json", self.run_id));
        let contents = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Best-effort `git rev-parse HEAD`; `None` when not run from within a git
/// checkout or `git` is unavailable, matching the spec's "if available".
fn git_hash() -> Option<String> {
    let output = std::process::Command::new("git").args(["rev-parse", "HEAD"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok().map(|s| s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_manifest_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = RunManifest::new("run-1", 1_000, "abc123");
        manifest.component_versions.insert("flowcore-data".to_string(), "0.1.0".to_string());
        manifest.finalize(2_000);
        manifest.write(dir.path()).unwrap();

        let path = dir.path().join("artifacts").join("run_logs").join("run_manifest_run-1.json");
        let loaded: RunManifest = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(loaded.run_id, "run-1");
        assert_eq!(loaded.ended_ms, Some(2_000));
    }

    #[test]
    fn source_manifest_only_snapshots_recognised_keys() {
        std::env::set_var("TIMEZONE", "UTC");
        std::env::set_var("UNRELATED_NOISE_VAR", "x");
        let manifest = SourceManifest::capture("run-1", "abc123");
        assert_eq!(manifest.env_snapshot.get("TIMEZONE").map(String::as_str), Some("UTC"));
        assert!(!manifest.env_snapshot.contains_key("UNRELATED_NOISE_VAR"));
        std::env::remove_var("TIMEZONE");
        std::env::remove_var("UNRELATED_NOISE_VAR");
    }
}
