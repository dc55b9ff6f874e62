use crate::config::AlgoConfig;
use crate::dedupe::DedupeSet;
use crate::record::{DecisionCode, Regime, Side, SignalRecord, SignalType, Strength};
use flowcore_data::canonical::{FeatureRow, Scenario2x2};
use fnv::FnvHashMap;
use smol_str::SmolStr;

/// Per-symbol state carried across rows: consecutive-direction run length,
/// the last confirmed side (for exit/cooldown detection) and its score
/// extremum, and how many rows have been observed (for warmup).
#[derive(Debug, Default, Clone)]
struct SymbolState {
    rows_seen: u64,
    consecutive_side: Option<Side>,
    consecutive_count: u32,
    confirmed_side: Option<Side>,
    run_extremum: f64,
    last_exit_side: Option<Side>,
    last_exit_ts_ms: Option<i64>,
    last_exit_extremum: f64,
}

/// Deterministic, stateful decision procedure (§4.2). One instance per
/// running process; state is keyed by symbol so a single `Decider` serves
/// every symbol the Harvester feeds it.
#[derive(Debug, Default)]
pub struct Decider {
    state: FnvHashMap<SmolStr, SymbolState>,
    dedupe: DedupeSet,
}

impl Decider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the eight-step decision procedure over one feature row, in
    /// strict order, and returns the resulting `SignalRecord`.
    pub fn decide(
        &mut self,
        symbol: &SmolStr,
        ts_ms: i64,
        signal_row_id: u64,
        row: &FeatureRow,
        config: &AlgoConfig,
    ) -> SignalRecord {
        let state = self.state.entry(symbol.clone()).or_default();
        state.rows_seen += 1;

        let regime = match row.scenario_2x2 {
            Scenario2x2::ActiveHighVol | Scenario2x2::ActiveLowVol => Regime::Active,
            Scenario2x2::QuietHighVol | Scenario2x2::QuietLowVol => Regime::Quiet,
        };

        let base = SignalRecord {
            ts_ms,
            symbol: symbol.clone(),
            signal_row_id,
            config_hash: config.config_hash(),
            rules_ver: AlgoConfig::rules_ver(),
            features_ver: AlgoConfig::features_ver(),
            score: row.fusion_score,
            side: Side::None,
            strength: Strength::None,
            signal_type: SignalType::None,
            confirm: false,
            gating: false,
            decision_code: DecisionCode::Ok,
            guard_reason: None,
            regime,
            scenario: row.scenario_2x2,
            consistency: row.consistency,
            warmup: false,
            weak_signal_throttle: false,
        };

        // Step 1: warmup.
        if state.rows_seen < config.warmup_rows {
            return SignalRecord { warmup: true, decision_code: DecisionCode::Warmup, ..base };
        }

        // Step 2: baseline guards, checked in the order the spec lists them.
        let mut gating = false;
        let mut guard_reason = None;
        if row.lag_ms_to_trade > config.lag_cap_ms {
            gating = true;
            guard_reason = Some(DecisionCode::LagExceedsCap);
        } else if row.spread_bps > config.spread_cap_bps {
            gating = true;
            guard_reason = Some(DecisionCode::SpreadTooWide);
        } else if row.trades_per_min < config.activity_min_trades_per_min {
            gating = true;
            guard_reason = Some(DecisionCode::MarketInactive);
        }

        // Step 3: scenario thresholds.
        let (buy_threshold, sell_threshold) = config.thresholds_for(row.scenario_2x2);
        let side = if row.fusion_score >= buy_threshold {
            Side::Buy
        } else if row.fusion_score <= sell_threshold {
            Side::Sell
        } else {
            Side::None
        };
        let strength = match row.fusion_score.abs() {
            s if s >= config.strength_strong_threshold => Strength::Strong,
            s if s >= config.strength_normal_threshold => Strength::Normal,
            _ => Strength::None,
        };
        let signal_type = signal_type_for(side, strength);

        // Step 4: weak-signal throttle (does not suppress emission on its own).
        let weak_signal_throttle = row.fusion_score.abs() < config.weak_signal_threshold;

        let mut confirm = true;
        let mut decision_code = DecisionCode::Ok;
        if gating {
            confirm = false;
            decision_code = guard_reason.expect("guard_reason set whenever gating is true");
        }

        // Step 5: consistency gate.
        if confirm && row.consistency < config.consistency_min {
            confirm = false;
            decision_code = DecisionCode::LowConsistency;
        }

        // Step 6: consecutive-direction confirmation.
        if side == Side::Buy || side == Side::Sell {
            if state.consecutive_side == Some(side) {
                state.consecutive_count += 1;
            } else {
                state.consecutive_side = Some(side);
                state.consecutive_count = 1;
            }
        } else {
            state.consecutive_side = None;
            state.consecutive_count = 0;
        }
        if confirm && side != Side::None && state.consecutive_count < config.min_consecutive_same_dir {
            confirm = false;
        }

        // Step 7: reverse rearm / post-exit cooldown.
        if confirm && side != Side::None {
            if let (Some(exit_side), Some(exit_ts_ms)) = (state.last_exit_side, state.last_exit_ts_ms) {
                let is_reverse = exit_side != side;
                if is_reverse {
                    let since_exit_ms = ts_ms - exit_ts_ms;
                    if since_exit_ms < config.cooldown_after_exit_sec * 1_000 {
                        confirm = false;
                        decision_code = DecisionCode::CooldownBlocked;
                    } else if (row.fusion_score.abs() - state.last_exit_extremum.abs()) < config.flip_rearm_margin {
                        confirm = false;
                        decision_code = DecisionCode::RearmMarginBlocked;
                    }
                }
            }
        }

        // Step 8: dedupe.
        if confirm && self.dedupe.is_duplicate(symbol, signal_type, ts_ms, config.dedupe_ms) {
            confirm = false;
            decision_code = DecisionCode::Deduped;
        }

        if confirm {
            self.dedupe.record(symbol, signal_type, ts_ms);

            if side == Side::Buy || side == Side::Sell {
                if state.confirmed_side == Some(side) {
                    state.run_extremum = state.run_extremum.max(row.fusion_score.abs());
                } else {
                    state.run_extremum = row.fusion_score.abs();
                }
            } else if let Some(prior_side) = state.confirmed_side {
                state.last_exit_side = Some(prior_side);
                state.last_exit_ts_ms = Some(ts_ms);
                state.last_exit_extremum = state.run_extremum;
            }
            state.confirmed_side = Some(side);
        }

        SignalRecord {
            side,
            strength,
            signal_type,
            confirm,
            gating,
            decision_code,
            guard_reason,
            weak_signal_throttle,
            ..base
        }
    }
}

fn signal_type_for(side: Side, strength: Strength) -> SignalType {
    match (side, strength) {
        (Side::Buy, Strength::Strong) => SignalType::StrongBuy,
        (Side::Buy, _) => SignalType::Buy,
        (Side::Sell, Strength::Strong) => SignalType::StrongSell,
        (Side::Sell, _) => SignalType::Sell,
        (Side::None, _) => SignalType::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(fusion_score: f64, consistency: f64) -> FeatureRow {
        FeatureRow {
            mid: dec!(100),
            best_bid: dec!(99.9),
            best_ask: dec!(100.1),
            spread_bps: 10.0,
            z_ofi: 1.0,
            z_cvd: 1.0,
            fusion_score,
            consistency,
            scenario_2x2: Scenario2x2::ActiveHighVol,
            lag_ms_to_trade: 10,
            trades_per_min: 20.0,
            quote_updates_per_sec: 5.0,
        }
    }

    #[test]
    fn rows_below_warmup_window_are_marked_warmup() {
        let mut decider = Decider::new();
        let config = AlgoConfig { warmup_rows: 5, ..AlgoConfig::default() };
        let symbol = SmolStr::new("BTC-USD");
        let record = decider.decide(&symbol, 1_000, 1, &row(2.0, 0.9), &config);
        assert!(record.warmup);
        assert!(!record.confirm);
        assert_eq!(record.decision_code, DecisionCode::Warmup);
    }

    #[test]
    fn baseline_guard_trips_on_wide_spread() {
        let mut decider = Decider::new();
        let config = AlgoConfig { warmup_rows: 0, min_consecutive_same_dir: 1, ..AlgoConfig::default() };
        let symbol = SmolStr::new("BTC-USD");
        let mut bad_row = row(2.0, 0.9);
        bad_row.spread_bps = 999.0;
        let record = decider.decide(&symbol, 1_000, 1, &bad_row, &config);
        assert!(record.gating);
        assert_eq!(record.guard_reason, Some(DecisionCode::SpreadTooWide));
        assert!(!record.confirm);
    }

    #[test]
    fn low_consistency_blocks_confirmation() {
        let mut decider = Decider::new();
        let config = AlgoConfig { warmup_rows: 0, min_consecutive_same_dir: 1, ..AlgoConfig::default() };
        let symbol = SmolStr::new("BTC-USD");
        let record = decider.decide(&symbol, 1_000, 1, &row(2.0, 0.01), &config);
        assert!(!record.confirm);
        assert_eq!(record.decision_code, DecisionCode::LowConsistency);
    }

    #[test]
    fn confirms_after_enough_consecutive_same_direction_rows() {
        let mut decider = Decider::new();
        let config = AlgoConfig { warmup_rows: 0, min_consecutive_same_dir: 3, ..AlgoConfig::default() };
        let symbol = SmolStr::new("BTC-USD");
        let mut last = decider.decide(&symbol, 1_000, 1, &row(2.0, 0.9), &config);
        assert!(!last.confirm);
        last = decider.decide(&symbol, 1_100, 2, &row(2.0, 0.9), &config);
        assert!(!last.confirm);
        last = decider.decide(&symbol, 1_200, 3, &row(2.0, 0.9), &config);
        assert!(last.confirm);
        assert_eq!(last.signal_type, SignalType::Buy);
    }

    #[test]
    fn dedupe_suppresses_identical_signal_within_window() {
        let mut decider = Decider::new();
        let config = AlgoConfig {
            warmup_rows: 0,
            min_consecutive_same_dir: 1,
            dedupe_ms: 500,
            ..AlgoConfig::default()
        };
        let symbol = SmolStr::new("BTC-USD");
        let first = decider.decide(&symbol, 1_000, 1, &row(2.0, 0.9), &config);
        assert!(first.confirm);
        let second = decider.decide(&symbol, 1_100, 2, &row(2.0, 0.9), &config);
        assert!(!second.confirm);
        assert_eq!(second.decision_code, DecisionCode::Deduped);
    }
}
