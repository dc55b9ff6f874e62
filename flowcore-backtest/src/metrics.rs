use crate::trade::ClosedTrade;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

/// `metrics.json` (§4.4). Only `pnl_net`/`avg_pnl_per_trade`/`win_rate_trades`
/// are emitted — the source material's legacy `net_pnl`/`pnl_per_trade`
/// aliases are deliberately dropped (§9 decision).
#[derive(Debug, Clone, Serialize)]
pub struct BacktestMetrics {
    pub pnl_net: f64,
    pub avg_pnl_per_trade: f64,
    pub win_rate_trades: f64,
    pub trades_per_hour: f64,
    pub cost_bps_on_turnover: f64,
    pub trade_count: usize,
}

/// Compute [`BacktestMetrics`] over a closed run's trades.
///
/// `wall_duration_ms` is the span between the first and last feature row
/// replayed, used for `trades_per_hour`; `turnover_notional` is the sum of
/// every fill's `|qty * px|`, used as the denominator for `cost_bps_on_turnover`.
pub fn compute_metrics(trades: &[ClosedTrade], wall_duration_ms: i64, turnover_notional: Decimal) -> BacktestMetrics {
    let trade_count = trades.len();
    if trade_count == 0 {
        return BacktestMetrics {
            pnl_net: 0.0,
            avg_pnl_per_trade: 0.0,
            win_rate_trades: 0.0,
            trades_per_hour: 0.0,
            cost_bps_on_turnover: 0.0,
            trade_count: 0,
        };
    }

    let pnl_net: Decimal = trades.iter().map(|t| t.pnl).sum();
    let wins = trades.iter().filter(|t| t.pnl > Decimal::ZERO).count();
    let total_fees: Decimal = trades.iter().map(|t| t.fees).sum();

    let hours = (wall_duration_ms.max(1) as f64) / 3_600_000.0;
    let cost_bps = if turnover_notional.is_zero() {
        0.0
    } else {
        (total_fees / turnover_notional * Decimal::from(10_000)).to_f64().unwrap_or(0.0)
    };

    BacktestMetrics {
        pnl_net: pnl_net.to_f64().unwrap_or(0.0),
        avg_pnl_per_trade: (pnl_net / Decimal::from(trade_count as u64)).to_f64().unwrap_or(0.0),
        win_rate_trades: wins as f64 / trade_count as f64,
        trades_per_hour: trade_count as f64 / hours,
        cost_bps_on_turnover: cost_bps,
        trade_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trade::ExitReason;
    use flowcore_execution::Side;
    use rust_decimal_macros::dec;

    fn trade(pnl: Decimal) -> ClosedTrade {
        ClosedTrade {
            symbol: "BTCUSDT".into(),
            side: Side::Buy,
            qty: dec!(1),
            entry_px: dec!(100),
            exit_px: dec!(100) + pnl,
            entry_ts_ms: 0,
            exit_ts_ms: 1_000,
            fees: dec!(0.1),
            pnl,
            exit_reason: ExitReason::TakeProfit,
        }
    }

    #[test]
    fn win_rate_counts_only_strictly_positive_pnl_trades() {
        let trades = vec![trade(dec!(1)), trade(dec!(-1)), trade(dec!(0))];
        let metrics = compute_metrics(&trades, 3_600_000, dec!(300));
        assert_eq!(metrics.trade_count, 3);
        assert!((metrics.win_rate_trades - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_trade_list_yields_zeroed_metrics() {
        let metrics = compute_metrics(&[], 1_000, dec!(0));
        assert_eq!(metrics.trade_count, 0);
        assert_eq!(metrics.pnl_net, 0.0);
    }
}
