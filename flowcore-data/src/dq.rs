use crate::canonical::{CanonicalRow, RowPayload};
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Low-cardinality reason a row failed the DQ gate (§4.1 "DQ Gate").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum DqViolation {
    SchemaVersionMismatch,
    TimestampNonMonotonic,
    CrossedBook,
    NonFiniteNumeric,
    MissingRequiredField,
}

/// Accumulates per-reason violation counts; flushed hourly to
/// `<root>/artifacts/dq/dq_<hour>.json`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DqReport {
    pub total_rows: u64,
    pub accepted_rows: u64,
    pub violations: FnvHashMap<DqViolation, u64>,
}

impl DqReport {
    pub fn record(&mut self, violation: DqViolation) {
        *self.violations.entry(violation).or_insert(0) += 1;
    }

    pub fn fail_rate(&self) -> f64 {
        if self.total_rows == 0 {
            0.0
        } else {
            (self.total_rows - self.accepted_rows) as f64 / self.total_rows as f64
        }
    }

    pub fn write_hourly(&self, root: &Path, hour_bucket: &str) -> std::io::Result<()> {
        let dir = root.join("artifacts").join("dq");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("dq_{hour_bucket}.json"));
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)
    }
}

/// Maximum DQ violation fail rate before rows are diverted to the
/// dead-letter directory instead of being dropped silently.
pub const DEAD_LETTER_FAIL_RATE: f64 = 0.2;

/// Validates a single [`CanonicalRow`] against schema version, monotonicity,
/// depth sanity and numeric finiteness, recording any violation in `report`.
pub struct DqGate {
    expected_schema_version: u16,
    last_ts_ms: FnvHashMap<(smol_str::SmolStr, crate::canonical::Kind), i64>,
}

impl DqGate {
    pub fn new(expected_schema_version: u16) -> Self {
        Self { expected_schema_version, last_ts_ms: FnvHashMap::default() }
    }

    /// Returns `Ok(())` if the row passes every check, otherwise the first
    /// violation encountered (checks run in the order the spec lists them).
    pub fn validate(&mut self, row: &CanonicalRow, report: &mut DqReport) -> Result<(), DqViolation> {
        report.total_rows += 1;

        let outcome = self.validate_inner(row);
        match outcome {
            Ok(()) => {
                report.accepted_rows += 1;
                Ok(())
            }
            Err(violation) => {
                report.record(violation);
                Err(violation)
            }
        }
    }

    fn validate_inner(&mut self, row: &CanonicalRow) -> Result<(), DqViolation> {
        if row.schema_version != self.expected_schema_version {
            return Err(DqViolation::SchemaVersionMismatch);
        }

        let key = (row.symbol.clone(), row.kind());
        if let Some(&last) = self.last_ts_ms.get(&key) {
            if row.ts_ms < last {
                return Err(DqViolation::TimestampNonMonotonic);
            }
        }
        self.last_ts_ms.insert(key, row.ts_ms);

        match &row.payload {
            RowPayload::Orderbook(depth) => {
                if depth.is_crossed() {
                    return Err(DqViolation::CrossedBook);
                }
            }
            RowPayload::Feature(feature) => {
                let finite = [
                    feature.spread_bps,
                    feature.z_ofi,
                    feature.z_cvd,
                    feature.fusion_score,
                    feature.consistency,
                    feature.lag_ms_to_trade as f64,
                    feature.trades_per_min,
                    feature.quote_updates_per_sec,
                ]
                .iter()
                .all(|v| v.is_finite());
                if !finite {
                    return Err(DqViolation::NonFiniteNumeric);
                }
            }
            _ => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::{CanonicalRow, DepthLevel, DepthSnapshot, FeatureRow, Scenario2x2, Side, TradeRow};
    use rust_decimal_macros::dec;

    fn trade_row(ts_ms: i64, row_id: u64) -> CanonicalRow {
        CanonicalRow::new(
            ts_ms,
            ts_ms + 1,
            "BTCUSDT",
            row_id,
            RowPayload::Trade(TradeRow { price: dec!(100), qty: dec!(1), side: Side::Buy, is_maker: false }),
        )
    }

    #[test]
    fn accepts_well_formed_monotone_rows() {
        let mut gate = DqGate::new(1);
        let mut report = DqReport::default();
        assert!(gate.validate(&trade_row(1_000, 1), &mut report).is_ok());
        assert!(gate.validate(&trade_row(1_010, 2), &mut report).is_ok());
        assert_eq!(report.accepted_rows, 2);
    }

    #[test]
    fn rejects_non_monotonic_timestamps() {
        let mut gate = DqGate::new(1);
        let mut report = DqReport::default();
        gate.validate(&trade_row(1_000, 1), &mut report).unwrap();
        let result = gate.validate(&trade_row(900, 2), &mut report);
        assert_eq!(result, Err(DqViolation::TimestampNonMonotonic));
    }

    #[test]
    fn rejects_schema_version_mismatch() {
        let mut gate = DqGate::new(2);
        let mut report = DqReport::default();
        let result = gate.validate(&trade_row(1_000, 1), &mut report);
        assert_eq!(result, Err(DqViolation::SchemaVersionMismatch));
    }

    #[test]
    fn rejects_crossed_book() {
        let mut gate = DqGate::new(1);
        let mut report = DqReport::default();
        let row = CanonicalRow::new(
            1_000,
            1_001,
            "BTCUSDT",
            1,
            RowPayload::Orderbook(DepthSnapshot {
                bids: vec![DepthLevel { price: dec!(101), qty: dec!(1) }],
                asks: vec![DepthLevel { price: dec!(100), qty: dec!(1) }],
            }),
        );
        assert_eq!(gate.validate(&row, &mut report), Err(DqViolation::CrossedBook));
    }

    #[test]
    fn rejects_non_finite_feature_values() {
        let mut gate = DqGate::new(1);
        let mut report = DqReport::default();
        let row = CanonicalRow::new(
            1_000,
            1_001,
            "BTCUSDT",
            1,
            RowPayload::Feature(FeatureRow {
                mid: dec!(100),
                best_bid: dec!(99.9),
                best_ask: dec!(100.1),
                spread_bps: f64::NAN,
                z_ofi: 0.0,
                z_cvd: 0.0,
                fusion_score: 0.0,
                consistency: 0.5,
                scenario_2x2: Scenario2x2::ActiveHighVol,
                lag_ms_to_trade: 5,
                trades_per_min: 1.0,
                quote_updates_per_sec: 1.0,
            }),
        );
        assert_eq!(gate.validate(&row, &mut report), Err(DqViolation::NonFiniteNumeric));
    }
}
