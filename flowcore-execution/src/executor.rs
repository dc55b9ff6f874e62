use crate::adapter::{AdapterError, CancelResult, Fill, Position};
use crate::idempotency::IdempotencyTracker;
use crate::order::{ClientOrderId, ExecResult, ExecStatus, OrderCtx, RejectReason};
use async_trait::async_trait;
use flowcore_instrument::rng::SeededRng;
use flowcore_integration::JitteredBackoff;
use rand::Rng;
use smol_str::SmolStr;
use std::time::Duration;
use tracing::warn;

/// Capability set every execution venue implements (§4.3, §9 "Inheritance-
/// based executors" → capability set): Backtest, Testnet and Live are three
/// concrete variants; [`crate::shadow::ShadowExecutor`] composes two.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn submit(&mut self, ctx: OrderCtx) -> Result<ExecResult, AdapterError>;
    async fn cancel(&mut self, client_order_id: &ClientOrderId) -> Result<CancelResult, AdapterError>;
    async fn fetch_fills(&mut self, since_ts_ms: i64) -> Result<Vec<Fill>, AdapterError>;
    async fn get_position(&mut self, symbol: &SmolStr) -> Result<Option<Position>, AdapterError>;
    async fn flush(&mut self);
    async fn close(&mut self);
}

fn reject_reason_for(err: &AdapterError) -> RejectReason {
    match err {
        AdapterError::Rejected(_) => RejectReason::ExchangeRejected4xx,
        AdapterError::Retryable(_) => RejectReason::ExchangeUnavailable5xx,
        AdapterError::RateLimited { .. } => RejectReason::RateLimited,
        AdapterError::Timeout => RejectReason::Timeout,
    }
}

const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Wraps any [`Executor`] with the idempotency gate and retry policy every
/// submission path shares (§4.3 "Idempotency Tracker": LRU lookup combined
/// with exponential-backoff-with-jitter retry, max 3 attempts, retries only
/// on network/5xx errors).
pub struct GuardedExecutor<E> {
    inner: E,
    idempotency: IdempotencyTracker,
    backoff: JitteredBackoff,
    rng: SeededRng,
}

impl<E: Executor> GuardedExecutor<E> {
    pub fn new(inner: E, idempotency_capacity: usize, backoff: JitteredBackoff, seed: u64) -> Self {
        Self {
            inner,
            idempotency: IdempotencyTracker::new(idempotency_capacity),
            backoff,
            rng: SeededRng::from_seed(seed),
        }
    }

    /// Submit `ctx`, rejecting immediately on a duplicate `client_order_id`
    /// (§8 P5) and retrying retryable adapter failures up to
    /// [`MAX_RETRY_ATTEMPTS`] times with jittered backoff.
    pub async fn submit_guarded(&mut self, ctx: OrderCtx) -> ExecResult {
        if self.idempotency.is_duplicate(&ctx.client_order_id) {
            return rejected(&ctx, RejectReason::IdempotentDuplicate);
        }
        self.idempotency.record(ctx.client_order_id.clone());

        let mut attempt = 0u32;
        loop {
            match self.inner.submit(ctx.clone()).await {
                Ok(result) => return result,
                Err(err) if err.is_retryable() && attempt < MAX_RETRY_ATTEMPTS => {
                    attempt += 1;
                    let delay = self.backoff.delay(attempt, self.rng.inner_mut());
                    warn!(attempt, ?delay, error = %err, "retrying order submission");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return rejected(&ctx, reject_reason_for(&err)),
            }
        }
    }

    pub async fn cancel(&mut self, client_order_id: &ClientOrderId) -> Result<CancelResult, AdapterError> {
        self.inner.cancel(client_order_id).await
    }

    pub async fn fetch_fills(&mut self, since_ts_ms: i64) -> Result<Vec<Fill>, AdapterError> {
        self.inner.fetch_fills(since_ts_ms).await
    }

    pub async fn get_position(&mut self, symbol: &SmolStr) -> Result<Option<Position>, AdapterError> {
        self.inner.get_position(symbol).await
    }

    pub async fn flush(&mut self) {
        self.inner.flush().await
    }

    pub async fn close(&mut self) {
        self.inner.close().await
    }
}

fn rejected(ctx: &OrderCtx, reason: RejectReason) -> ExecResult {
    ExecResult {
        status: ExecStatus::Rejected,
        client_order_id: ctx.client_order_id.clone(),
        exchange_order_id: None,
        reject_reason: Some(reason),
        latency_ms: 0,
        slippage_bps: None,
        rounding_applied: false,
        sent_ts_ms: ctx.event_ts_ms,
        ack_ts_ms: None,
        fill_ts_ms: None,
        px_fill: None,
        fee: None,
    }
}

#[allow(dead_code)]
fn retry_window() -> Duration {
    Duration::from_millis(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MockAdapter;
    use crate::live::AdapterExecutor;
    use crate::order::{OrderType, Side, TimeInForce};
    use flowcore_data::canonical::Scenario2x2;
    use flowcore_signal::record::Regime;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn ctx(signal_row_id: u64) -> OrderCtx {
        let client_order_id = ClientOrderId::derive(signal_row_id, 1_000, Side::Buy, dec!(1), Some(dec!(100)));
        OrderCtx {
            client_order_id,
            symbol: "BTCUSDT".into(),
            side: Side::Buy,
            qty: dec!(1),
            order_type: OrderType::Limit,
            price: Some(dec!(100)),
            time_in_force: TimeInForce::Gtc,
            signal_row_id,
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
    async fn duplicate_client_order_id_is_rejected_without_reaching_the_adapter() {
        let adapter = Arc::new(MockAdapter::default());
        let inner = AdapterExecutor::new(adapter);
        let mut guarded = GuardedExecutor::new(inner, 16, JitteredBackoff::new(Duration::from_millis(1), Duration::from_millis(5)), 1);

        let first = guarded.submit_guarded(ctx(1)).await;
        assert_eq!(first.status, ExecStatus::Accepted);

        let second = guarded.submit_guarded(ctx(1)).await;
        assert_eq!(second.status, ExecStatus::Rejected);
        assert_eq!(second.reject_reason, Some(RejectReason::IdempotentDuplicate));
    }
}
