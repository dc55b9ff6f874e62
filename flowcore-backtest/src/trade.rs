use flowcore_execution::Side;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Why an [`OpenTrade`] was closed (§4.4 "Exits").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    TimeNeutral,
    ReverseSignal,
}

/// Take-profit / stop-loss / max-hold exit thresholds (§4.4).
#[derive(Debug, Clone, Copy)]
pub struct ExitPolicy {
    pub take_profit_bps: f64,
    pub stop_loss_bps: f64,
    pub max_hold_time_sec: i64,
}

impl Default for ExitPolicy {
    fn default() -> Self {
        Self { take_profit_bps: 40.0, stop_loss_bps: 20.0, max_hold_time_sec: 3_600 }
    }
}

/// A single outstanding position this run's simulated Executor is holding.
#[derive(Debug, Clone)]
pub struct OpenTrade {
    pub symbol: SmolStr,
    pub side: Side,
    pub qty: Decimal,
    pub entry_px: Decimal,
    pub entry_ts_ms: i64,
    pub entry_fee: Decimal,
}

impl OpenTrade {
    /// Unrealized move against `mid`, in bps, signed so a positive value
    /// always means the trade is in profit regardless of side.
    fn unrealized_bps(&self, mid: Decimal) -> f64 {
        if self.entry_px.is_zero() {
            return 0.0;
        }
        let signed = match self.side {
            Side::Buy => (mid - self.entry_px) / self.entry_px,
            Side::Sell => (self.entry_px - mid) / self.entry_px,
        };
        (signed * Decimal::from(10_000)).to_f64().unwrap_or(0.0)
    }

    /// Whether this trade should be closed given the current `mid`, elapsed
    /// time, exit policy and whether a signal reversal has just fired
    /// (§4.4 exits: take-profit, stop-loss, time-neutral, reverse signal).
    pub fn exit_reason(&self, mid: Decimal, now_ms: i64, policy: &ExitPolicy, reverse_signal: bool) -> Option<ExitReason> {
        let bps = self.unrealized_bps(mid);
        if bps >= policy.take_profit_bps {
            Some(ExitReason::TakeProfit)
        } else if bps <= -policy.stop_loss_bps {
            Some(ExitReason::StopLoss)
        } else if reverse_signal {
            Some(ExitReason::ReverseSignal)
        } else if now_ms - self.entry_ts_ms >= policy.max_hold_time_sec * 1_000 {
            Some(ExitReason::TimeNeutral)
        } else {
            None
        }
    }
}

/// A realised round-trip, one record per closed position (§4.4 `trades.jsonl`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub symbol: SmolStr,
    pub side: Side,
    pub qty: Decimal,
    pub entry_px: Decimal,
    pub exit_px: Decimal,
    pub entry_ts_ms: i64,
    pub exit_ts_ms: i64,
    pub fees: Decimal,
    pub pnl: Decimal,
    pub exit_reason: ExitReason,
}

impl ClosedTrade {
    /// PnL per trade = `(exit_price − entry_price) · qty · side_sign − fees` (§4.4).
    pub fn close(open: OpenTrade, exit_px: Decimal, exit_ts_ms: i64, exit_fee: Decimal, exit_reason: ExitReason) -> Self {
        let side_sign = match open.side {
            Side::Buy => Decimal::ONE,
            Side::Sell => -Decimal::ONE,
        };
        let pnl = (exit_px - open.entry_px) * open.qty * side_sign - open.entry_fee - exit_fee;
        Self {
            symbol: open.symbol,
            side: open.side,
            qty: open.qty,
            entry_px: open.entry_px,
            exit_px,
            entry_ts_ms: open.entry_ts_ms,
            exit_ts_ms,
            fees: open.entry_fee + exit_fee,
            pnl,
            exit_reason,
        }
    }
}

impl flowcore_integration::SqlRecord for ClosedTrade {
    const TABLE: &'static str = "trades";
    const CREATE_SQL: &'static str = "CREATE TABLE IF NOT EXISTS trades (
        symbol TEXT NOT NULL,
        side TEXT NOT NULL,
        qty TEXT NOT NULL,
        entry_px TEXT NOT NULL,
        exit_px TEXT NOT NULL,
        entry_ts_ms INTEGER NOT NULL,
        exit_ts_ms INTEGER NOT NULL,
        fees TEXT NOT NULL,
        pnl TEXT NOT NULL,
        exit_reason TEXT NOT NULL
    )";
    const INSERT_SQL: &'static str = "INSERT INTO trades
        (symbol, side, qty, entry_px, exit_px, entry_ts_ms, exit_ts_ms, fees, pnl, exit_reason)
        VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)";

    fn to_params(&self) -> Vec<rusqlite::types::Value> {
        use rusqlite::types::Value;
        vec![
            Value::Text(self.symbol.to_string()),
            Value::Text(self.side.to_string()),
            Value::Text(self.qty.to_string()),
            Value::Text(self.entry_px.to_string()),
            Value::Text(self.exit_px.to_string()),
            Value::Integer(self.entry_ts_ms),
            Value::Integer(self.exit_ts_ms),
            Value::Text(self.fees.to_string()),
            Value::Text(self.pnl.to_string()),
            Value::Text(self.exit_reason.to_string()),
        ]
    }
}

impl flowcore_integration::ParityTags for ClosedTrade {
    fn parity_tags(&self) -> Vec<&'static str> {
        let mut tags = vec!["total"];
        if self.pnl > Decimal::ZERO {
            tags.push("win_count");
        }
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn long_trade() -> OpenTrade {
        OpenTrade { symbol: "BTCUSDT".into(), side: Side::Buy, qty: dec!(1), entry_px: dec!(100), entry_ts_ms: 0, entry_fee: dec!(0) }
    }

    #[test]
    fn take_profit_triggers_once_bps_threshold_is_crossed() {
        let trade = long_trade();
        let policy = ExitPolicy { take_profit_bps: 40.0, ..Default::default() };
        assert_eq!(trade.exit_reason(dec!(100.40), 1_000, &policy, false), Some(ExitReason::TakeProfit));
        assert_eq!(trade.exit_reason(dec!(100.10), 1_000, &policy, false), None);
    }

    #[test]
    fn stop_loss_triggers_on_adverse_move() {
        let trade = long_trade();
        let policy = ExitPolicy { stop_loss_bps: 20.0, ..Default::default() };
        assert_eq!(trade.exit_reason(dec!(99.80), 1_000, &policy, false), Some(ExitReason::StopLoss));
    }

    #[test]
    fn time_neutral_triggers_after_max_hold() {
        let trade = long_trade();
        let policy = ExitPolicy { max_hold_time_sec: 60, ..Default::default() };
        assert_eq!(trade.exit_reason(dec!(100), 61_000, &policy, false), Some(ExitReason::TimeNeutral));
        assert_eq!(trade.exit_reason(dec!(100), 59_000, &policy, false), None);
    }

    #[test]
    fn closing_a_long_computes_signed_pnl_net_of_fees() {
        let trade = long_trade();
        let closed = ClosedTrade::close(trade, dec!(101), 1_000, dec!(0.1), ExitReason::TakeProfit);
        assert_eq!(closed.pnl, dec!(0.9));
    }
}
