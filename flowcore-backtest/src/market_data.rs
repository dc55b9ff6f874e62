use crate::error::BacktestError;
use crate::loader::{DataLoader, TimestampedRow};
use std::sync::Arc;

/// Historical feature data a backtest run replays, abstracted the same way
/// the live pipeline abstracts an exchange stream (§6, §9 "BacktestMarketData").
pub trait BacktestMarketData {
    fn time_first_event_ms(&self) -> Option<i64>;
    fn rows(&self) -> Arc<Vec<TimestampedRow>>;
}

/// In-memory market data: loads every historical row up front and replays it
/// by cloning an `Arc`, mirroring the live pipeline's lazy-clone streaming
/// idiom without committing to an async `Stream` the replay loop doesn't
/// actually need (replay is driven synchronously row by row, §4.4).
#[derive(Debug, Clone)]
pub struct MarketDataInMemory {
    rows: Arc<Vec<TimestampedRow>>,
}

impl MarketDataInMemory {
    pub fn new(rows: Vec<TimestampedRow>) -> Self {
        Self { rows: Arc::new(rows) }
    }

    pub async fn from_loader(loader: &dyn DataLoader) -> Result<Self, BacktestError> {
        let rows = loader.load().await?;
        if rows.is_empty() {
            return Err(BacktestError::EmptyMarketData);
        }
        Ok(Self::new(rows))
    }
}

impl BacktestMarketData for MarketDataInMemory {
    fn time_first_event_ms(&self) -> Option<i64> {
        self.rows.first().map(|r| r.ts_ms)
    }

    fn rows(&self) -> Arc<Vec<TimestampedRow>> {
        Arc::clone(&self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::TimestampedRow;
    use flowcore_data::canonical::{FeatureRow, Scenario2x2};
    use rust_decimal_macros::dec;

    fn row(ts_ms: i64) -> TimestampedRow {
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

    #[test]
    fn time_first_event_is_the_earliest_row() {
        let data = MarketDataInMemory::new(vec![row(1_000), row(2_000)]);
        assert_eq!(data.time_first_event_ms(), Some(1_000));
    }
}
