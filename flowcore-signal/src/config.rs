use flowcore_data::canonical::Scenario2x2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-scenario buy/sell threshold offsets (§4.2 "Scenario thresholds").
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScenarioOverride {
    pub buy_offset: f64,
    pub sell_offset: f64,
}

/// Algorithm configuration for the Decision Engine. Every field here is
/// "algorithm-relevant" and therefore part of `config_hash`'s fingerprint
/// surface (§4.2, §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgoConfig {
    pub warmup_rows: u64,
    pub lag_cap_ms: i64,
    pub spread_cap_bps: f64,
    pub activity_min_trades_per_min: f64,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    #[serde(default)]
    pub scenario_overrides: HashMap<String, ScenarioOverride>,
    pub weak_signal_threshold: f64,
    pub consistency_min: f64,
    pub min_consecutive_same_dir: u32,
    pub cooldown_after_exit_sec: i64,
    pub flip_rearm_margin: f64,
    pub dedupe_ms: i64,
    pub strength_normal_threshold: f64,
    pub strength_strong_threshold: f64,
}

impl Default for AlgoConfig {
    fn default() -> Self {
        Self {
            warmup_rows: 30,
            lag_cap_ms: 2_000,
            spread_cap_bps: 20.0,
            activity_min_trades_per_min: 1.0,
            buy_threshold: 1.0,
            sell_threshold: -1.0,
            scenario_overrides: HashMap::new(),
            weak_signal_threshold: 0.5,
            consistency_min: 0.3,
            min_consecutive_same_dir: 2,
            cooldown_after_exit_sec: 30,
            flip_rearm_margin: 0.25,
            dedupe_ms: 250,
            strength_normal_threshold: 1.0,
            strength_strong_threshold: 2.0,
        }
    }
}

impl AlgoConfig {
    /// Thresholds after applying the active scenario's override, if any.
    pub fn thresholds_for(&self, scenario: Scenario2x2) -> (f64, f64) {
        let key = scenario.to_string();
        match self.scenario_overrides.get(&key) {
            Some(ov) => (self.buy_threshold + ov.buy_offset, self.sell_threshold + ov.sell_offset),
            None => (self.buy_threshold, self.sell_threshold),
        }
    }

    /// Stable digest over every algorithm-relevant field (§4.2, §9).
    pub fn config_hash(&self) -> String {
        let value = serde_json::to_value(self).expect("AlgoConfig always serializes");
        flowcore_integration::config_hash(&value)
    }

    /// `rules_ver`/`features_ver` are read from the environment once at
    /// process start, defaulting to `"v1"` (§9 open-question decision).
    pub fn rules_ver() -> String {
        std::env::var("RULES_VER").unwrap_or_else(|_| "v1".to_string())
    }

    pub fn features_ver() -> String {
        std::env::var("FEATURES_VER").unwrap_or_else(|_| "v1".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_hash_is_stable_for_identical_config() {
        let a = AlgoConfig::default();
        let b = AlgoConfig::default();
        assert_eq!(a.config_hash(), b.config_hash());
    }

    #[test]
    fn config_hash_changes_when_a_field_changes() {
        let a = AlgoConfig::default();
        let mut b = AlgoConfig::default();
        b.buy_threshold = 5.0;
        assert_ne!(a.config_hash(), b.config_hash());
    }

    #[test]
    fn scenario_override_shifts_thresholds() {
        let mut config = AlgoConfig::default();
        config.scenario_overrides.insert(
            Scenario2x2::ActiveHighVol.to_string(),
            ScenarioOverride { buy_offset: 0.5, sell_offset: -0.5 },
        );
        let (buy, sell) = config.thresholds_for(Scenario2x2::ActiveHighVol);
        assert_eq!(buy, 1.5);
        assert_eq!(sell, -1.5);
    }
}
