use crate::adapter::{AdapterError, CancelResult, Fill, Position};
use crate::executor::Executor;
use crate::order::{ClientOrderId, ExecResult, OrderCtx};
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use smol_str::SmolStr;
use tracing::warn;

/// Running agreement ratio between a shadow executor's decisions and the
/// main executor's (§4.3 "shadow executor wrapper pattern"): the fraction of
/// submissions where both sides agreed on accept/reject and, when both
/// filled, priced within `price_tolerance_bps` of each other.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParityStats {
    pub compared: u64,
    pub agreed: u64,
}

impl ParityStats {
    pub fn ratio(&self) -> f64 {
        if self.compared == 0 {
            1.0
        } else {
            self.agreed as f64 / self.compared as f64
        }
    }
}

/// Routes every order to the `main` executor for real and to `shadow` for
/// comparison only — `shadow`'s result is never surfaced to callers, it only
/// feeds [`ParityStats`] (e.g. running a candidate Testnet adapter silently
/// alongside the live one before promoting it).
pub struct ShadowExecutor<M, S> {
    main: M,
    shadow: S,
    price_tolerance_bps: f64,
    stats: ParityStats,
}

impl<M: Executor, S: Executor> ShadowExecutor<M, S> {
    pub fn new(main: M, shadow: S, price_tolerance_bps: f64) -> Self {
        Self { main, shadow, price_tolerance_bps, stats: ParityStats::default() }
    }

    pub fn stats(&self) -> ParityStats {
        self.stats
    }

    fn compare(&mut self, main: &ExecResult, shadow: &ExecResult) {
        self.stats.compared += 1;
        let status_agrees = main.status == shadow.status;

        let price_agrees = match (main.px_fill, shadow.px_fill) {
            (Some(a), Some(b)) if !a.is_zero() => {
                let diff_bps = ((a - b) / a * rust_decimal::Decimal::from(10_000)).abs().to_f64().unwrap_or(f64::MAX);
                diff_bps <= self.price_tolerance_bps
            }
            (None, None) => true,
            _ => false,
        };

        if status_agrees && price_agrees {
            self.stats.agreed += 1;
        } else {
            warn!(main_status = %main.status, shadow_status = %shadow.status, "shadow executor diverged from main");
        }
    }
}

#[async_trait]
impl<M: Executor, S: Executor> Executor for ShadowExecutor<M, S> {
    async fn submit(&mut self, ctx: OrderCtx) -> Result<ExecResult, AdapterError> {
        let main_result = self.main.submit(ctx.clone()).await?;
        match self.shadow.submit(ctx).await {
            Ok(shadow_result) => self.compare(&main_result, &shadow_result),
            Err(err) => warn!(error = %err, "shadow executor submit failed"),
        }
        Ok(main_result)
    }

    async fn cancel(&mut self, client_order_id: &ClientOrderId) -> Result<CancelResult, AdapterError> {
        let _ = self.shadow.cancel(client_order_id).await;
        self.main.cancel(client_order_id).await
    }

    async fn fetch_fills(&mut self, since_ts_ms: i64) -> Result<Vec<Fill>, AdapterError> {
        self.main.fetch_fills(since_ts_ms).await
    }

    async fn get_position(&mut self, symbol: &SmolStr) -> Result<Option<Position>, AdapterError> {
        self.main.get_position(symbol).await
    }

    async fn flush(&mut self) {
        self.main.flush().await;
        self.shadow.flush().await;
    }

    async fn close(&mut self) {
        self.main.close().await;
        self.shadow.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::{BacktestExecutor, FeeModel, MidPriceSource};
    use crate::order::{OrderType, Side, TimeInForce};
    use flowcore_data::canonical::Scenario2x2;
    use flowcore_instrument::time::SimClock;
    use flowcore_signal::record::Regime;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct FixedMid(Decimal);
    impl MidPriceSource for FixedMid {
        fn mid(&self, _symbol: &str) -> Option<Decimal> {
            Some(self.0)
        }
    }

    fn ctx() -> OrderCtx {
        OrderCtx {
            client_order_id: ClientOrderId::derive(1, 1_000, Side::Buy, dec!(1), None),
            symbol: "BTCUSDT".into(),
            side: Side::Buy,
            qty: dec!(1),
            order_type: OrderType::Market,
            price: None,
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

    #[tokio::test]
    async fn identical_backtest_executors_report_full_agreement() {
        let main = BacktestExecutor::new(FixedMid(dec!(100)), SimClock::new(1_000), FeeModel::default(), 1);
        let shadow = BacktestExecutor::new(FixedMid(dec!(100)), SimClock::new(1_000), FeeModel::default(), 1);
        let mut executor = ShadowExecutor::new(main, shadow, 50.0);

        executor.submit(ctx()).await.unwrap();
        let stats = executor.stats();
        assert_eq!(stats.compared, 1);
        assert_eq!(stats.agreed, 1);
        assert_eq!(stats.ratio(), 1.0);
    }
}
