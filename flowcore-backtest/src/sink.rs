use crate::error::BacktestError;
use crate::trade::ClosedTrade;
use flowcore_integration::{DualSink, JsonlSink, RotationPolicy};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// One day's realized PnL, bucketed by the UTC calendar day of `exit_ts_ms`
/// (§4.4 `pnl_daily.jsonl`).
#[derive(Debug, Clone, Serialize)]
pub struct DailyPnl {
    pub date: String,
    pub pnl_net: Decimal,
    pub trade_count: usize,
}

fn utc_date(ts_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts_ms)
        .unwrap_or_default()
        .format("%Y-%m-%d")
        .to_string()
}

/// Roll a run's closed trades up into one [`DailyPnl`] row per UTC day.
pub fn daily_pnl(trades: &[ClosedTrade]) -> Vec<DailyPnl> {
    let mut buckets: BTreeMap<String, (Decimal, usize)> = BTreeMap::new();
    for trade in trades {
        let entry = buckets.entry(utc_date(trade.exit_ts_ms)).or_insert((Decimal::ZERO, 0));
        entry.0 += trade.pnl;
        entry.1 += 1;
    }
    buckets
        .into_iter()
        .map(|(date, (pnl_net, trade_count))| DailyPnl { date, pnl_net, trade_count })
        .collect()
}

/// Durable sink for a run's closed trades, using the same spool→ready
/// dual-sink discipline as [`flowcore_execution::outbox::Outbox`] (§4.6).
pub struct TradeSink {
    sink: DualSink<ClosedTrade>,
}

impl TradeSink {
    pub fn open(root: impl Into<std::path::PathBuf>, sqlite_path: impl AsRef<Path>) -> Result<Self, BacktestError> {
        Ok(Self {
            sink: DualSink::open(root, "trades", "trades", sqlite_path, RotationPolicy::default(), 50, 1_000)?,
        })
    }

    pub fn record(&mut self, trade: &ClosedTrade, now_ms: i64) -> Result<(), BacktestError> {
        self.sink.write_at(trade, now_ms)?;
        Ok(())
    }

    pub fn flush(&mut self, now_ms: i64) -> Result<(), BacktestError> {
        self.sink.flush_at(now_ms)?;
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), BacktestError> {
        self.sink.close()?;
        Ok(())
    }
}

/// Write `pnl_daily.jsonl` as a one-shot rollup at the end of a run — unlike
/// `trades.jsonl`/`exec_log`, this derived summary has no SQLite counterpart
/// to keep in parity with, so a plain [`JsonlSink`] is enough.
pub fn write_daily_pnl(root: impl Into<std::path::PathBuf>, trades: &[ClosedTrade], now_ms: i64) -> Result<(), BacktestError> {
    let mut sink = JsonlSink::new(root, "pnl_daily", "pnl_daily", RotationPolicy::default());
    for row in daily_pnl(trades) {
        sink.write_at(&row, now_ms)?;
    }
    sink.flush_at(now_ms)?;
    sink.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trade::ExitReason;
    use flowcore_execution::Side;
    use rust_decimal_macros::dec;

    fn trade(exit_ts_ms: i64, pnl: Decimal) -> ClosedTrade {
        ClosedTrade {
            symbol: "BTCUSDT".into(),
            side: Side::Buy,
            qty: dec!(1),
            entry_px: dec!(100),
            exit_px: dec!(100) + pnl,
            entry_ts_ms: exit_ts_ms - 1_000,
            exit_ts_ms,
            fees: dec!(0.1),
            pnl,
            exit_reason: ExitReason::TakeProfit,
        }
    }

    #[test]
    fn daily_pnl_buckets_trades_by_utc_calendar_day() {
        let day_one_ms = 1_700_000_000_000;
        let trades = vec![trade(day_one_ms, dec!(1)), trade(day_one_ms + 60_000, dec!(2)), trade(day_one_ms + 86_400_000, dec!(-1))];
        let rollup = daily_pnl(&trades);
        assert_eq!(rollup.len(), 2);
        assert_eq!(rollup[0].trade_count, 2);
        assert_eq!(rollup[0].pnl_net, dec!(3));
    }

    #[test]
    fn trade_sink_persists_closed_trades_durably() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = TradeSink::open(dir.path(), dir.path().join("trades.db")).unwrap();
        sink.record(&trade(1_700_000_000_000, dec!(1)), 1_700_000_000_000).unwrap();
        sink.flush(1_700_000_000_000).unwrap();
        sink.close().unwrap();
    }
}
