use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use smol_str::SmolStr;

/// Order side, distinct from [`flowcore_signal`]'s `Side` (which also
/// carries a `none` variant for the no-signal case) — an `OrderCtx` only
/// ever exists once a signal has resolved to an actionable direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum TimeInForce {
    Gtc,
    Ioc,
    Fok,
}

/// Low-cardinality error kind, safe as a metric label (§7). `Display` (via
/// `thiserror`) emits the same snake_case tag `serde` uses, so the JSONL and
/// SQLite sinks agree on the stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    #[error("schema_invalid")]
    SchemaInvalid,
    #[error("warmup")]
    Warmup,
    #[error("spread_too_wide")]
    SpreadTooWide,
    #[error("lag_exceeds_cap")]
    LagExceedsCap,
    #[error("market_inactive")]
    MarketInactive,
    #[error("low_consistency")]
    LowConsistency,
    #[error("rate_limited")]
    RateLimited,
    #[error("idempotent_duplicate")]
    IdempotentDuplicate,
    #[error("exchange_rejected4xx")]
    ExchangeRejected4xx,
    #[error("exchange_unavailable5xx")]
    ExchangeUnavailable5xx,
    #[error("timeout")]
    Timeout,
    #[error("filter_min_notional")]
    FilterMinNotional,
    #[error("filter_step_size")]
    FilterStepSize,
    #[error("notional_limit_exceeded")]
    NotionalLimitExceeded,
}

/// Client-generated identifier, a hash of `signal_row_id | ts_ms | side |
/// qty | px` (§3 "OrderCtx"). Deterministic given identical inputs, which
/// is what makes idempotent retry and the P1 reproducibility property
/// possible: resubmitting the same logical order always yields the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize, derive_more::Display)]
#[serde(transparent)]
pub struct ClientOrderId(pub SmolStr);

impl ClientOrderId {
    pub fn derive(signal_row_id: u64, ts_ms: i64, side: Side, qty: Decimal, px: Option<Decimal>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(signal_row_id.to_le_bytes());
        hasher.update(ts_ms.to_le_bytes());
        hasher.update(side.to_string().as_bytes());
        hasher.update(qty.to_string().as_bytes());
        if let Some(px) = px {
            hasher.update(px.to_string().as_bytes());
        }
        let digest = hasher.finalize();
        Self(SmolStr::new(hex::encode(&digest[..12])))
    }
}

/// Strategy → Executor order context (§3 "OrderCtx").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCtx {
    pub client_order_id: ClientOrderId,
    pub symbol: SmolStr,
    pub side: Side,
    pub qty: Decimal,
    pub order_type: OrderType,
    pub price: Option<Decimal>,
    pub time_in_force: TimeInForce,

    pub signal_row_id: u64,
    pub regime: flowcore_signal::record::Regime,
    pub scenario: flowcore_data::canonical::Scenario2x2,
    pub warmup: bool,
    pub guard_reason: Option<SmolStr>,
    pub consistency: f64,
    pub weak_signal_throttle: bool,

    pub tick_size: Decimal,
    pub step_size: Decimal,
    pub min_notional: Decimal,

    pub costs_bps: f64,
    pub event_ts_ms: i64,
}

/// Terminal/non-terminal status of an [`ExecResult`] (§3, state machine in
/// §4.3: `NEW → ACK → (PARTIAL*) → FILLED | CANCELED | REJECTED`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum ExecStatus {
    Accepted,
    Rejected,
    Filled,
    Partial,
    Canceled,
}

impl ExecStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecStatus::Filled | ExecStatus::Rejected | ExecStatus::Canceled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecResult {
    pub status: ExecStatus,
    pub client_order_id: ClientOrderId,
    pub exchange_order_id: Option<String>,
    pub reject_reason: Option<RejectReason>,
    pub latency_ms: i64,
    pub slippage_bps: Option<f64>,
    pub rounding_applied: bool,
    pub sent_ts_ms: i64,
    pub ack_ts_ms: Option<i64>,
    pub fill_ts_ms: Option<i64>,
    pub px_fill: Option<Decimal>,
    pub fee: Option<Decimal>,
}

/// Lifecycle transition kind of an [`ExecLogEvent`] (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Submit,
    Ack,
    Partial,
    Filled,
    Rejected,
    Canceled,
}

/// One execution-log record per order lifecycle transition (§3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecLogEvent {
    pub ts_ms: i64,
    pub symbol: SmolStr,
    pub event: EventKind,
    pub status: ExecStatus,
    pub client_order_id: ClientOrderId,
    pub exchange_order_id: Option<String>,
    pub px_intent: Option<Decimal>,
    pub px_sent: Option<Decimal>,
    pub px_fill: Option<Decimal>,
    pub qty: Decimal,
    pub reject_reason: Option<RejectReason>,
    pub latency_ms: i64,
}

impl ExecLogEvent {
    pub fn from_result(symbol: SmolStr, qty: Decimal, px_intent: Option<Decimal>, px_sent: Option<Decimal>, result: &ExecResult, ts_ms: i64) -> Self {
        let event = match result.status {
            ExecStatus::Accepted => EventKind::Ack,
            ExecStatus::Partial => EventKind::Partial,
            ExecStatus::Filled => EventKind::Filled,
            ExecStatus::Rejected => EventKind::Rejected,
            ExecStatus::Canceled => EventKind::Canceled,
        };
        Self {
            ts_ms,
            symbol,
            event,
            status: result.status,
            client_order_id: result.client_order_id.clone(),
            exchange_order_id: result.exchange_order_id.clone(),
            px_intent,
            px_sent,
            px_fill: result.px_fill,
            qty,
            reject_reason: result.reject_reason,
            latency_ms: result.latency_ms,
        }
    }
}

impl flowcore_integration::SqlRecord for ExecLogEvent {
    const TABLE: &'static str = "exec_log";
    const CREATE_SQL: &'static str = "CREATE TABLE IF NOT EXISTS exec_log (
        ts_ms INTEGER NOT NULL,
        symbol TEXT NOT NULL,
        event TEXT NOT NULL,
        status TEXT NOT NULL,
        client_order_id TEXT NOT NULL,
        exchange_order_id TEXT,
        px_intent TEXT,
        px_sent TEXT,
        px_fill TEXT,
        qty TEXT NOT NULL,
        reject_reason TEXT,
        latency_ms INTEGER NOT NULL
    )";
    const INSERT_SQL: &'static str = "INSERT INTO exec_log (
        ts_ms, symbol, event, status, client_order_id, exchange_order_id,
        px_intent, px_sent, px_fill, qty, reject_reason, latency_ms
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)";

    fn to_params(&self) -> Vec<rusqlite::types::Value> {
        use rusqlite::types::Value;
        vec![
            Value::Integer(self.ts_ms),
            Value::Text(self.symbol.to_string()),
            Value::Text(self.event.to_string()),
            Value::Text(self.status.to_string()),
            Value::Text(self.client_order_id.to_string()),
            self.exchange_order_id.clone().map(Value::Text).unwrap_or(Value::Null),
            self.px_intent.map(|p| Value::Text(p.to_string())).unwrap_or(Value::Null),
            self.px_sent.map(|p| Value::Text(p.to_string())).unwrap_or(Value::Null),
            self.px_fill.map(|p| Value::Text(p.to_string())).unwrap_or(Value::Null),
            Value::Text(self.qty.to_string()),
            self.reject_reason.map(|r| Value::Text(r.to_string())).unwrap_or(Value::Null),
            Value::Integer(self.latency_ms),
        ]
    }
}

impl flowcore_integration::ParityTags for ExecLogEvent {
    fn parity_tags(&self) -> Vec<&'static str> {
        let mut tags = vec!["total"];
        match self.event {
            EventKind::Submit => tags.push("submit_count"),
            EventKind::Filled => tags.push("filled_count"),
            EventKind::Rejected => tags.push("gating_breakdown"),
            _ => {}
        }
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn client_order_id_is_deterministic_for_identical_inputs() {
        let a = ClientOrderId::derive(1, 1_000, Side::Buy, dec!(1.5), Some(dec!(100)));
        let b = ClientOrderId::derive(1, 1_000, Side::Buy, dec!(1.5), Some(dec!(100)));
        assert_eq!(a, b);
    }

    #[test]
    fn client_order_id_differs_when_any_input_differs() {
        let a = ClientOrderId::derive(1, 1_000, Side::Buy, dec!(1.5), Some(dec!(100)));
        let b = ClientOrderId::derive(1, 1_000, Side::Sell, dec!(1.5), Some(dec!(100)));
        assert_ne!(a, b);
    }

    #[test]
    fn exec_status_terminal_classification() {
        assert!(ExecStatus::Filled.is_terminal());
        assert!(ExecStatus::Rejected.is_terminal());
        assert!(ExecStatus::Canceled.is_terminal());
        assert!(!ExecStatus::Accepted.is_terminal());
        assert!(!ExecStatus::Partial.is_terminal());
    }
}
