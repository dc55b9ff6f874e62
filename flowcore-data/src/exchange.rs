use crate::canonical::CanonicalRow;
use async_trait::async_trait;
use flowcore_instrument::ExchangeId;
use smol_str::SmolStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("subscription rejected for {symbol}: {reason}")]
    SubscriptionRejected { symbol: SmolStr, reason: String },
    #[error("stream closed")]
    Closed,
}

/// Abstract exchange wire contract (§6): a stream of [`CanonicalRow`]s for a
/// fixed set of symbols/kinds, with the minimal lifecycle the Harvester
/// drives it through. Real exchange adapters are out of scope; this crate
/// ships only the contract and a [`MockExchangeStream`] used in tests and
/// replay-driven development.
#[async_trait]
pub trait ExchangeStream: Send {
    fn id(&self) -> ExchangeId;

    /// Subscribe to the given symbols, failing fast if any is rejected.
    async fn subscribe(&mut self, symbols: &[SmolStr]) -> Result<(), StreamError>;

    /// Pull the next normalized row, or `None` once the stream is exhausted
    /// (replay mode) / closed.
    async fn next_row(&mut self) -> Result<Option<CanonicalRow>, StreamError>;

    async fn close(&mut self) -> Result<(), StreamError>;
}

/// Deterministic, in-memory [`ExchangeStream`] that replays a pre-built
/// sequence of rows. Used for backtests, unit tests and local development
/// in place of a live exchange connection.
pub struct MockExchangeStream {
    id: ExchangeId,
    rows: std::collections::VecDeque<CanonicalRow>,
    subscribed: Vec<SmolStr>,
    reject: Option<SmolStr>,
}

impl MockExchangeStream {
    pub fn new(id: ExchangeId, rows: Vec<CanonicalRow>) -> Self {
        Self { id, rows: rows.into(), subscribed: Vec::new(), reject: None }
    }

    /// Configure this mock to reject subscription to the given symbol,
    /// exercising the Harvester's fail-fast startup path.
    pub fn reject_symbol(mut self, symbol: impl Into<SmolStr>) -> Self {
        self.reject = Some(symbol.into());
        self
    }
}

#[async_trait]
impl ExchangeStream for MockExchangeStream {
    fn id(&self) -> ExchangeId {
        self.id
    }

    async fn subscribe(&mut self, symbols: &[SmolStr]) -> Result<(), StreamError> {
        for symbol in symbols {
            if self.reject.as_ref() == Some(symbol) {
                return Err(StreamError::SubscriptionRejected {
                    symbol: symbol.clone(),
                    reason: "mock rejection".into(),
                });
            }
        }
        self.subscribed.extend_from_slice(symbols);
        Ok(())
    }

    async fn next_row(&mut self) -> Result<Option<CanonicalRow>, StreamError> {
        Ok(self.rows.pop_front())
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.rows.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::{RowPayload, Side, TradeRow};
    use rust_decimal_macros::dec;

    fn trade(row_id: u64) -> CanonicalRow {
        CanonicalRow::new(
            row_id as i64,
            row_id as i64,
            "BTCUSDT",
            row_id,
            RowPayload::Trade(TradeRow { price: dec!(100), qty: dec!(1), side: Side::Buy, is_maker: false }),
        )
    }

    #[tokio::test]
    async fn mock_stream_yields_rows_in_order_then_none() {
        let mut stream = MockExchangeStream::new(ExchangeId::Mock, vec![trade(1), trade(2)]);
        stream.subscribe(&["BTCUSDT".into()]).await.unwrap();
        assert_eq!(stream.next_row().await.unwrap().unwrap().row_id, 1);
        assert_eq!(stream.next_row().await.unwrap().unwrap().row_id, 2);
        assert!(stream.next_row().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mock_stream_fails_fast_on_rejected_subscription() {
        let mut stream = MockExchangeStream::new(ExchangeId::Mock, vec![]).reject_symbol("ETHUSDT");
        let result = stream.subscribe(&["ETHUSDT".into()]).await;
        assert!(matches!(result, Err(StreamError::SubscriptionRejected { .. })));
    }
}
