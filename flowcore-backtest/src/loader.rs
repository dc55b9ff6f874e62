use crate::error::BacktestError;
use async_trait::async_trait;
use flowcore_data::canonical::FeatureRow;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fs::File;
use std::io::{BufRead, BufReader};

/// One historical feature row with the symbol and exchange event time it was
/// observed at — the unit [`DataLoader`] reads and [`crate::market_data::BacktestMarketData`]
/// replays (§4.4: "historical reader feeding the same feature schema into
/// the same Signal Generator").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedRow {
    pub ts_ms: i64,
    pub symbol: SmolStr,
    pub row: FeatureRow,
}

impl flowcore_integration::sink::sqlite::SqlRecord for TimestampedRow {
    const TABLE: &'static str = "feature_rows";
    const CREATE_SQL: &'static str = "CREATE TABLE IF NOT EXISTS feature_rows (
        ts_ms INTEGER NOT NULL,
        symbol TEXT NOT NULL,
        fusion_score REAL NOT NULL,
        consistency REAL NOT NULL,
        scenario TEXT NOT NULL,
        row TEXT NOT NULL,
        PRIMARY KEY (symbol, ts_ms)
    )";
    const INSERT_SQL: &'static str = "INSERT OR REPLACE INTO feature_rows
        (ts_ms, symbol, fusion_score, consistency, scenario, row)
        VALUES (?1,?2,?3,?4,?5,?6)";

    fn to_params(&self) -> Vec<rusqlite::types::Value> {
        use rusqlite::types::Value;
        vec![
            Value::Integer(self.ts_ms),
            Value::Text(self.symbol.to_string()),
            Value::Real(self.row.fusion_score),
            Value::Real(self.row.consistency),
            Value::Text(self.row.scenario_2x2.to_string()),
            Value::Text(serde_json::to_string(&self.row).unwrap_or_default()),
        ]
    }
}

impl flowcore_integration::sink::ParityTags for TimestampedRow {
    fn parity_tags(&self) -> Vec<&'static str> {
        vec!["total"]
    }
}

/// Generic interface for loading historical feature data for a backtest run.
#[async_trait]
pub trait DataLoader: Send + Sync {
    async fn load(&self) -> Result<Vec<TimestampedRow>, BacktestError>;
}

/// Loader for JSON-lines formatted feature files — one [`TimestampedRow`]
/// per line, as produced by the live Harvester's feature sink.
#[derive(Debug, Clone)]
pub struct JsonLinesLoader {
    file_path: String,
}

impl JsonLinesLoader {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self { file_path: file_path.into() }
    }
}

#[async_trait]
impl DataLoader for JsonLinesLoader {
    async fn load(&self) -> Result<Vec<TimestampedRow>, BacktestError> {
        let file = File::open(&self.file_path).map_err(|e| BacktestError::Loader(e.to_string()))?;
        let reader = BufReader::new(file);
        let mut rows = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(|e| BacktestError::Loader(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            let row: TimestampedRow = serde_json::from_str(&line).map_err(|e| BacktestError::Loader(e.to_string()))?;
            rows.push(row);
        }
        rows.sort_by_key(|r| r.ts_ms);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowcore_data::canonical::Scenario2x2;
    use rust_decimal_macros::dec;
    use std::io::Write;

    fn sample_row(ts_ms: i64) -> TimestampedRow {
        TimestampedRow {
            ts_ms,
            symbol: "BTCUSDT".into(),
            row: FeatureRow {
                mid: dec!(100),
                best_bid: dec!(99.9),
                best_ask: dec!(100.1),
                spread_bps: 10.0,
                z_ofi: 1.0,
                z_cvd: 1.0,
                fusion_score: 2.0,
                consistency: 0.9,
                scenario_2x2: Scenario2x2::ActiveHighVol,
                lag_ms_to_trade: 10,
                trades_per_min: 20.0,
                quote_updates_per_sec: 5.0,
            },
        }
    }

    #[tokio::test]
    async fn loads_and_sorts_rows_by_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.jsonl");
        let mut file = File::create(&path).unwrap();
        for row in [sample_row(2_000), sample_row(1_000)] {
            writeln!(file, "{}", serde_json::to_string(&row).unwrap()).unwrap();
        }

        let loader = JsonLinesLoader::new(path.to_string_lossy().to_string());
        let rows = loader.load().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ts_ms, 1_000);
        assert_eq!(rows[1].ts_ms, 2_000);
    }
}
