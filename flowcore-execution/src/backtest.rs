use crate::adapter::{AdapterError, CancelResult, Fill, Position};
use crate::executor::Executor;
use crate::order::{ClientOrderId, ExecResult, ExecStatus, OrderCtx, OrderType, Side};
use async_trait::async_trait;
use flowcore_instrument::rng::SeededRng;
use flowcore_instrument::time::TimeProvider;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use smol_str::SmolStr;
use std::collections::HashMap;

/// Flat maker/taker fee schedule (§9 Open Question: "Cost/slippage model" —
/// decided default is flat bps per side, no tiered volume schedule, so the
/// Backtest executor is trivially equivalent to the Live fee path).
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct FeeModel {
    pub maker_fee_bps: f64,
    pub taker_fee_bps: f64,
    pub slippage_bps: f64,
}

impl Default for FeeModel {
    fn default() -> Self {
        Self { maker_fee_bps: 1.0, taker_fee_bps: 4.0, slippage_bps: 2.0 }
    }
}

/// Source of the reference mid price a [`BacktestExecutor`] fills against.
/// `flowcore-backtest`'s replay loop supplies this from the current
/// `FeatureRow`; tests and the executor's own unit tests can stub it.
pub trait MidPriceSource: Send + Sync {
    fn mid(&self, symbol: &str) -> Option<Decimal>;
}

/// Deterministic fill outcome of [`simulate_fill`], shared verbatim between
/// this crate's Backtest executor and `flowcore-backtest`'s replay harness
/// so the two can never diverge (§8 P1: Backtest/Live bit-identical
/// reproducibility is only achievable if there is exactly one fill model).
#[derive(Debug, Clone, Copy)]
pub struct FillOutcome {
    pub px_fill: Decimal,
    pub fee: Decimal,
    pub is_maker: bool,
}

/// Simulate the fill of `side`/`qty` against `mid`, per §4.4: a market order
/// fills at `mid ± slippage_bps/2` (against the trader, i.e. buys fill above
/// mid and sells fill below), a limit order fills at its own limit price
/// whenever that price already crosses `mid` (immediately marketable),
/// otherwise is treated as resting and filled at the limit price with no
/// slippage. Fees are the flat per-side bps in `fees`, charged on notional.
pub fn simulate_fill(side: Side, order_type: OrderType, limit_price: Option<Decimal>, qty: Decimal, mid: Decimal, fees: &FeeModel) -> FillOutcome {
    let half_slip = Decimal::from_f64_retain(fees.slippage_bps / 2.0 / 10_000.0).unwrap_or_default();
    let direction = match side {
        Side::Buy => Decimal::ONE,
        Side::Sell => -Decimal::ONE,
    };

    let (px_fill, is_maker) = match order_type {
        OrderType::Market => (mid + mid * half_slip * direction, false),
        OrderType::Limit => {
            let limit = limit_price.unwrap_or(mid);
            let crosses = match side {
                Side::Buy => limit >= mid,
                Side::Sell => limit <= mid,
            };
            if crosses {
                (mid + mid * half_slip * direction, false)
            } else {
                (limit, true)
            }
        }
    };

    let fee_bps = if is_maker { fees.maker_fee_bps } else { fees.taker_fee_bps };
    let fee = px_fill * qty * Decimal::from_f64_retain(fee_bps / 10_000.0).unwrap_or_default();
    FillOutcome { px_fill, fee, is_maker }
}

/// In-process executor that fills orders deterministically against a
/// [`MidPriceSource`] rather than any network venue (§4.3 "Backtest"
/// variant).
pub struct BacktestExecutor<P, T> {
    prices: P,
    clock: T,
    fees: FeeModel,
    rng: SeededRng,
    positions: HashMap<SmolStr, Position>,
    fills: Vec<Fill>,
}

impl<P: MidPriceSource, T: TimeProvider> BacktestExecutor<P, T> {
    pub fn new(prices: P, clock: T, fees: FeeModel, seed: u64) -> Self {
        Self { prices, clock, fees, rng: SeededRng::from_seed(seed), positions: HashMap::new(), fills: Vec::new() }
    }

    fn apply_fill(&mut self, ctx: &OrderCtx, outcome: FillOutcome, ts_ms: i64) {
        let signed_qty = match ctx.side {
            Side::Buy => ctx.qty,
            Side::Sell => -ctx.qty,
        };
        let entry = self.positions.entry(ctx.symbol.clone()).or_insert(Position { qty: Decimal::ZERO, avg_entry_px: outcome.px_fill });
        let new_qty = entry.qty + signed_qty;
        if !new_qty.is_zero() && entry.qty.signum() == signed_qty.signum() {
            let total_cost = entry.avg_entry_px * entry.qty.abs() + outcome.px_fill * ctx.qty;
            entry.avg_entry_px = total_cost / new_qty.abs();
        } else if !new_qty.is_zero() {
            entry.avg_entry_px = outcome.px_fill;
        }
        entry.qty = new_qty;

        self.fills.push(Fill {
            client_order_id: ctx.client_order_id.clone(),
            px: outcome.px_fill,
            qty: ctx.qty,
            fee: outcome.fee,
            ts_ms,
        });
    }
}

#[async_trait]
impl<P: MidPriceSource, T: TimeProvider> Executor for BacktestExecutor<P, T> {
    async fn submit(&mut self, ctx: OrderCtx) -> Result<ExecResult, AdapterError> {
        let sent_ts_ms = self.clock.now_ms();
        let Some(mid) = self.prices.mid(&ctx.symbol) else {
            return Ok(ExecResult {
                status: ExecStatus::Rejected,
                client_order_id: ctx.client_order_id,
                exchange_order_id: None,
                reject_reason: Some(crate::order::RejectReason::MarketInactive),
                latency_ms: 0,
                slippage_bps: None,
                rounding_applied: false,
                sent_ts_ms,
                ack_ts_ms: None,
                fill_ts_ms: None,
                px_fill: None,
                fee: None,
            });
        };

        let outcome = simulate_fill(ctx.side, ctx.order_type, ctx.price, ctx.qty, mid, &self.fees);
        let ack_ts_ms = sent_ts_ms + self.rng.inner_mut().random_range(1..=25);
        let slippage_bps = ctx.price.and_then(|intended| {
            if intended.is_zero() {
                None
            } else {
                ((outcome.px_fill - intended) / intended * Decimal::from(10_000)).to_f64()
            }
        });

        self.apply_fill(&ctx, outcome, ack_ts_ms);

        Ok(ExecResult {
            status: ExecStatus::Filled,
            client_order_id: ctx.client_order_id,
            exchange_order_id: Some(format!("bt-{}", self.fills.len())),
            reject_reason: None,
            latency_ms: ack_ts_ms - sent_ts_ms,
            slippage_bps,
            rounding_applied: false,
            sent_ts_ms,
            ack_ts_ms: Some(ack_ts_ms),
            fill_ts_ms: Some(ack_ts_ms),
            px_fill: Some(outcome.px_fill),
            fee: Some(outcome.fee),
        })
    }

    async fn cancel(&mut self, _client_order_id: &ClientOrderId) -> Result<CancelResult, AdapterError> {
        Ok(CancelResult { canceled: false })
    }

    async fn fetch_fills(&mut self, since_ts_ms: i64) -> Result<Vec<Fill>, AdapterError> {
        Ok(self.fills.iter().filter(|f| f.ts_ms >= since_ts_ms).cloned().collect())
    }

    async fn get_position(&mut self, symbol: &SmolStr) -> Result<Option<Position>, AdapterError> {
        Ok(self.positions.get(symbol).copied())
    }

    async fn flush(&mut self) {}

    async fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::TimeInForce;
    use flowcore_data::canonical::Scenario2x2;
    use flowcore_instrument::time::SimClock;
    use flowcore_signal::record::Regime;
    use rust_decimal_macros::dec;

    struct FixedMid(Decimal);
    impl MidPriceSource for FixedMid {
        fn mid(&self, _symbol: &str) -> Option<Decimal> {
            Some(self.0)
        }
    }

    fn ctx(side: Side, order_type: OrderType, price: Option<Decimal>) -> OrderCtx {
        OrderCtx {
            client_order_id: ClientOrderId::derive(1, 1_000, side, dec!(1), price),
            symbol: "BTCUSDT".into(),
            side,
            qty: dec!(1),
            order_type,
            price,
            time_in_force: TimeInForce::Gtc,
            signal_row_id: 1,
            regime: Regime::Active,
            scenario: Scenario2x2::ActiveHighVol,
            warmup: false,
            guard_reason: None,
            consistency: 0.9,
            weak_signal_throttle: false,
            tick_size: dec!(0.1),
            step_size: dec!(0.001),
            min_notional: dec!(10),
            costs_bps: 1.0,
            event_ts_ms: 1_000,
        }
    }

    #[test]
    fn market_buy_fills_above_mid_and_market_sell_fills_below() {
        let fees = FeeModel::default();
        let buy = simulate_fill(Side::Buy, OrderType::Market, None, dec!(1), dec!(100), &fees);
        let sell = simulate_fill(Side::Sell, OrderType::Market, None, dec!(1), dec!(100), &fees);
        assert!(buy.px_fill > dec!(100));
        assert!(sell.px_fill < dec!(100));
        assert!(!buy.is_maker && !sell.is_maker);
    }

    #[test]
    fn resting_limit_order_fills_at_its_own_price_as_maker() {
        let fees = FeeModel::default();
        let outcome = simulate_fill(Side::Buy, OrderType::Limit, Some(dec!(99)), dec!(1), dec!(100), &fees);
        assert_eq!(outcome.px_fill, dec!(99));
        assert!(outcome.is_maker);
    }

    #[test]
    fn marketable_limit_order_fills_as_taker_with_slippage() {
        let fees = FeeModel::default();
        let outcome = simulate_fill(Side::Buy, OrderType::Limit, Some(dec!(101)), dec!(1), dec!(100), &fees);
        assert!(!outcome.is_maker);
        assert!(outcome.px_fill > dec!(100));
    }

    #[tokio::test]
    async fn submit_against_a_fixed_mid_updates_position_and_records_a_fill() {
        let mut executor = BacktestExecutor::new(FixedMid(dec!(100)), SimClock::new(1_000), FeeModel::default(), 7);
        let result = executor.submit(ctx(Side::Buy, OrderType::Market, None)).await.unwrap();
        assert_eq!(result.status, ExecStatus::Filled);

        let position = executor.get_position(&SmolStr::new("BTCUSDT")).await.unwrap().unwrap();
        assert_eq!(position.qty, dec!(1));

        let fills = executor.fetch_fills(0).await.unwrap();
        assert_eq!(fills.len(), 1);
    }

    #[tokio::test]
    async fn submit_with_no_mid_price_available_rejects_as_market_inactive() {
        struct NoMid;
        impl MidPriceSource for NoMid {
            fn mid(&self, _symbol: &str) -> Option<Decimal> {
                None
            }
        }
        let mut executor = BacktestExecutor::new(NoMid, SimClock::new(1_000), FeeModel::default(), 7);
        let result = executor.submit(ctx(Side::Buy, OrderType::Market, None)).await.unwrap();
        assert_eq!(result.status, ExecStatus::Rejected);
        assert_eq!(result.reject_reason, Some(crate::order::RejectReason::MarketInactive));
    }
}
