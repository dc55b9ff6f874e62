use crate::adapter::{AdapterError, CancelResult, ExchangeAdapter, Fill, Position};
use crate::executor::Executor;
use crate::order::{ClientOrderId, ExecResult, ExecStatus, OrderCtx};
use async_trait::async_trait;
use flowcore_instrument::time::TimeProvider;
use rust_decimal::prelude::ToPrimitive;
use smol_str::SmolStr;
use std::sync::Arc;

/// Executor variant backed by a concrete [`ExchangeAdapter`] — the Testnet
/// and Live variants named in §4.3 differ only in which adapter and which
/// venue credentials they're constructed with, not in behavior, so a single
/// generic type serves both (§9 "capability set" design note).
pub struct AdapterExecutor<A, T> {
    adapter: Arc<A>,
    clock: T,
}

impl<A: ExchangeAdapter, T: TimeProvider> AdapterExecutor<A, T> {
    pub fn new(adapter: Arc<A>, clock: T) -> Self {
        Self { adapter, clock }
    }
}

#[async_trait]
impl<A: ExchangeAdapter, T: TimeProvider + Send + Sync> Executor for AdapterExecutor<A, T> {
    async fn submit(&mut self, ctx: OrderCtx) -> Result<ExecResult, AdapterError> {
        let sent_ts_ms = self.clock.now_ms();
        let (exchange_order_id, px_fill, fee) = self.adapter.submit_order(&ctx).await?;
        let ack_ts_ms = self.clock.now_ms();
        let latency_ms = (ack_ts_ms - sent_ts_ms).max(0);

        let slippage_bps = ctx.price.map(|intended| {
            if intended.is_zero() {
                0.0
            } else {
                ((px_fill - intended) / intended * rust_decimal::Decimal::from(10_000))
                    .to_f64()
                    .unwrap_or(0.0)
            }
        });

        Ok(ExecResult {
            status: ExecStatus::Filled,
            client_order_id: ctx.client_order_id,
            exchange_order_id: Some(exchange_order_id),
            reject_reason: None,
            latency_ms,
            slippage_bps,
            rounding_applied: false,
            sent_ts_ms,
            ack_ts_ms: Some(ack_ts_ms),
            fill_ts_ms: Some(ack_ts_ms),
            px_fill: Some(px_fill),
            fee: Some(fee),
        })
    }

    async fn cancel(&mut self, client_order_id: &ClientOrderId) -> Result<CancelResult, AdapterError> {
        self.adapter.cancel_order(client_order_id).await
    }

    async fn fetch_fills(&mut self, since_ts_ms: i64) -> Result<Vec<Fill>, AdapterError> {
        self.adapter.fetch_fills(since_ts_ms).await
    }

    async fn get_position(&mut self, symbol: &SmolStr) -> Result<Option<Position>, AdapterError> {
        self.adapter.get_position(symbol).await
    }

    async fn flush(&mut self) {}

    async fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MockAdapter;
    use crate::order::{OrderType, Side, TimeInForce};
    use flowcore_data::canonical::Scenario2x2;
    use flowcore_instrument::time::LiveClock;
    use flowcore_signal::record::Regime;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn submit_against_a_mock_adapter_fills_immediately() {
        let adapter = Arc::new(MockAdapter::default());
        let mut executor = AdapterExecutor::new(adapter, LiveClock);
        let ctx = OrderCtx {
            client_order_id: ClientOrderId::derive(1, 1_000, Side::Buy, dec!(1), Some(dec!(100))),
            symbol: "BTCUSDT".into(),
            side: Side::Buy,
            qty: dec!(1),
            order_type: OrderType::Limit,
            price: Some(dec!(100)),
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
        };
        let result = executor.submit(ctx).await.unwrap();
        assert_eq!(result.status, ExecStatus::Filled);
        assert!(result.exchange_order_id.is_some());
    }
}
