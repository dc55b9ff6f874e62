use crate::order::{ClientOrderId, OrderCtx};
use async_trait::async_trait;
use rust_decimal::Decimal;
use smol_str::SmolStr;

/// Error taxonomy surfaced by an [`ExchangeAdapter`] (§6, §7).
///
/// `RetryableError`/`RateLimitError` are distinguished from a plain
/// `AdapterError` so the executor's retry policy (§4.3) can decide: network
/// absence and 5xx responses retry with backoff, 4xx (including explicit
/// exchange rejection) does not.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterError {
    #[error("exchange rejected the request (4xx): {0}")]
    Rejected(String),
    #[error("exchange unavailable (5xx or no response): {0}")]
    Retryable(String),
    #[error("rate limited by the exchange: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: i64 },
    #[error("request timed out")]
    Timeout,
}

impl AdapterError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdapterError::Retryable(_) | AdapterError::RateLimited { .. } | AdapterError::Timeout)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CancelResult {
    pub canceled: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Fill {
    pub client_order_id: ClientOrderId,
    pub px: Decimal,
    pub qty: Decimal,
    pub fee: Decimal,
    pub ts_ms: i64,
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct Position {
    pub qty: Decimal,
    pub avg_entry_px: Decimal,
}

/// Abstract exchange wire contract (§6): the capability set an adapter must
/// expose for the Testnet/Live executors to drive order submission, without
/// this workspace committing to any concrete venue's HTTP/WebSocket client
/// (explicit non-goal, §1).
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    async fn submit_order(&self, ctx: &OrderCtx) -> Result<(String, Decimal, Decimal), AdapterError>;
    async fn cancel_order(&self, client_order_id: &ClientOrderId) -> Result<CancelResult, AdapterError>;
    async fn fetch_fills(&self, since_ts_ms: i64) -> Result<Vec<Fill>, AdapterError>;
    async fn get_position(&self, symbol: &SmolStr) -> Result<Option<Position>, AdapterError>;

    /// Align `qty` to the venue's lot-size filter (§6 `normalize_quantity`).
    fn normalize_quantity(&self, qty: Decimal, step_size: Decimal) -> Decimal {
        if step_size.is_zero() {
            return qty;
        }
        (qty / step_size).trunc() * step_size
    }
}

/// Deterministic, in-memory [`ExchangeAdapter`] used by tests and local
/// development in place of a sandbox/live connection.
pub struct MockAdapter {
    pub reject: bool,
    pub fee_bps: Decimal,
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self { reject: false, fee_bps: Decimal::ZERO }
    }
}

#[async_trait]
impl ExchangeAdapter for MockAdapter {
    async fn submit_order(&self, ctx: &OrderCtx) -> Result<(String, Decimal, Decimal), AdapterError> {
        if self.reject {
            return Err(AdapterError::Rejected("mock rejection".into()));
        }
        let px = ctx.price.unwrap_or(Decimal::ONE);
        let fee = px * ctx.qty * self.fee_bps / Decimal::from(10_000);
        Ok((format!("mock-{}", ctx.client_order_id), px, fee))
    }

    async fn cancel_order(&self, _client_order_id: &ClientOrderId) -> Result<CancelResult, AdapterError> {
        Ok(CancelResult { canceled: true })
    }

    async fn fetch_fills(&self, _since_ts_ms: i64) -> Result<Vec<Fill>, AdapterError> {
        Ok(Vec::new())
    }

    async fn get_position(&self, _symbol: &SmolStr) -> Result<Option<Position>, AdapterError> {
        Ok(None)
    }
}
