use crate::canonical::Scenario2x2;

/// Thresholds used to classify activity and volatility regimes into the
/// 2x2 scenario grid (§4.1 "Scenario 2x2").
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct ScenarioThresholds {
    pub trades_per_min_active: f64,
    pub quote_updates_per_sec_active: f64,
    pub spread_bps_high_vol: f64,
}

impl Default for ScenarioThresholds {
    fn default() -> Self {
        Self {
            trades_per_min_active: 10.0,
            quote_updates_per_sec_active: 5.0,
            spread_bps_high_vol: 8.0,
        }
    }
}

/// Classify the current market state into one of the four scenario buckets.
pub fn classify(
    trades_per_min: f64,
    quote_updates_per_sec: f64,
    spread_bps: f64,
    thresholds: ScenarioThresholds,
) -> Scenario2x2 {
    let active = trades_per_min >= thresholds.trades_per_min_active
        || quote_updates_per_sec >= thresholds.quote_updates_per_sec_active;
    let high_vol = spread_bps >= thresholds.spread_bps_high_vol;

    match (active, high_vol) {
        (true, true) => Scenario2x2::ActiveHighVol,
        (true, false) => Scenario2x2::ActiveLowVol,
        (false, true) => Scenario2x2::QuietHighVol,
        (false, false) => Scenario2x2::QuietLowVol,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_and_volatile_is_a_h() {
        let s = classify(20.0, 10.0, 15.0, ScenarioThresholds::default());
        assert_eq!(s, Scenario2x2::ActiveHighVol);
    }

    #[test]
    fn quiet_and_calm_is_q_l() {
        let s = classify(1.0, 0.5, 1.0, ScenarioThresholds::default());
        assert_eq!(s, Scenario2x2::QuietLowVol);
    }

    #[test]
    fn quote_rate_alone_can_trigger_active() {
        let s = classify(0.0, 10.0, 1.0, ScenarioThresholds::default());
        assert_eq!(s, Scenario2x2::ActiveLowVol);
    }
}
