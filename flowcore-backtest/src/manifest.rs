use crate::error::BacktestError;
use serde::Serialize;
use std::path::Path;

/// `<root>/artifacts/run_logs/run_manifest_<run_id>.json` (§6): the fixed
/// record of exactly what configuration and input produced a run's outputs,
/// so a later run can be checked for bit-identical reproduction (§8 P1).
#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub run_id: String,
    pub seed: u64,
    pub config_hash: String,
    pub rules_ver: String,
    pub features_ver: String,
    pub started_ms: i64,
    pub ended_ms: i64,
    pub row_count: usize,
    pub trade_count: usize,
}

impl RunManifest {
    pub fn write(&self, root: impl AsRef<Path>) -> Result<(), BacktestError> {
        let dir = root.as_ref().join("artifacts").join("run_logs");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("run_manifest_{}.json", self.run_id));
        let contents = serde_json::to_vec_pretty(self).map_err(|e| BacktestError::Loader(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
