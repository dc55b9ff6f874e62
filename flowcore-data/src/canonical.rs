use crate::books::OrderBook;
use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Kind of a [`CanonicalRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Price,
    Orderbook,
    Trade,
    Feature,
}

/// Side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn sign(self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

/// Market regime / scenario bucket of the 2x2 grid (§4.1 "Scenario 2x2").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Display)]
pub enum Scenario2x2 {
    #[serde(rename = "A_H")]
    #[display("A_H")]
    ActiveHighVol,
    #[serde(rename = "A_L")]
    #[display("A_L")]
    ActiveLowVol,
    #[serde(rename = "Q_H")]
    #[display("Q_H")]
    QuietHighVol,
    #[serde(rename = "Q_L")]
    #[display("Q_L")]
    QuietLowVol,
}

/// One price level on either side of a depth snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct DepthLevel {
    pub price: Decimal,
    pub qty: Decimal,
}

/// Depth snapshot payload of a [`CanonicalRow`] with `kind = Orderbook`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DepthSnapshot {
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

impl DepthSnapshot {
    /// Is this book crossed (best bid at/above best ask)? Part of the DQ
    /// gate's "depth sanity" check.
    pub fn is_crossed(&self) -> bool {
        match (self.bids.first(), self.asks.first()) {
            (Some(bid), Some(ask)) => bid.price >= ask.price,
            _ => false,
        }
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    pub fn mid(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    pub fn spread_bps(&self) -> Option<f64> {
        use rust_decimal::prelude::ToPrimitive;
        let bid = self.best_bid()?.to_f64()?;
        let ask = self.best_ask()?.to_f64()?;
        let mid = (bid + ask) / 2.0;
        if mid == 0.0 {
            None
        } else {
            Some((ask - bid) / mid * 10_000.0)
        }
    }

    pub fn into_order_book(self, sequence: u64) -> OrderBook {
        OrderBook::new(
            sequence,
            None,
            self.bids.into_iter().map(|l| (l.price, l.qty)),
            self.asks.into_iter().map(|l| (l.price, l.qty)),
        )
    }
}

/// Trade payload of a [`CanonicalRow`] with `kind = Trade`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct TradeRow {
    pub price: Decimal,
    pub qty: Decimal,
    pub side: Side,
    pub is_maker: bool,
}

/// Wide feature row produced once enough inputs have accumulated (§3).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct FeatureRow {
    pub mid: Decimal,
    pub best_bid: Decimal,
    pub best_ask: Decimal,
    pub spread_bps: f64,
    pub z_ofi: f64,
    pub z_cvd: f64,
    pub fusion_score: f64,
    pub consistency: f64,
    pub scenario_2x2: Scenario2x2,
    pub lag_ms_to_trade: i64,
    pub trades_per_min: f64,
    pub quote_updates_per_sec: f64,
}

/// Row payload variants, discriminated by [`Kind`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowPayload {
    Price { price: Decimal },
    Orderbook(DepthSnapshot),
    Trade(TradeRow),
    Feature(FeatureRow),
}

impl RowPayload {
    pub fn kind(&self) -> Kind {
        match self {
            RowPayload::Price { .. } => Kind::Price,
            RowPayload::Orderbook(_) => Kind::Orderbook,
            RowPayload::Trade(_) => Kind::Trade,
            RowPayload::Feature(_) => Kind::Feature,
        }
    }
}

pub const SCHEMA_VERSION_CANONICAL_ROW: u16 = 1;

/// Normalised market-data row emitted by the Harvester (§3 "CanonicalRow").
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CanonicalRow {
    pub ts_ms: i64,
    pub recv_ts_ms: i64,
    pub symbol: SmolStr,
    pub row_id: u64,
    pub schema_version: u16,
    pub payload: RowPayload,
}

impl CanonicalRow {
    pub fn new(ts_ms: i64, recv_ts_ms: i64, symbol: impl Into<SmolStr>, row_id: u64, payload: RowPayload) -> Self {
        Self {
            ts_ms,
            recv_ts_ms,
            symbol: symbol.into(),
            row_id,
            schema_version: SCHEMA_VERSION_CANONICAL_ROW,
            payload,
        }
    }

    pub fn kind(&self) -> Kind {
        self.payload.kind()
    }
}

impl flowcore_integration::sink::sqlite::SqlRecord for CanonicalRow {
    const TABLE: &'static str = "canonical_rows";
    const CREATE_SQL: &'static str = "CREATE TABLE IF NOT EXISTS canonical_rows (
        ts_ms INTEGER NOT NULL,
        recv_ts_ms INTEGER NOT NULL,
        symbol TEXT NOT NULL,
        row_id INTEGER NOT NULL,
        schema_version INTEGER NOT NULL,
        kind TEXT NOT NULL,
        payload TEXT NOT NULL,
        PRIMARY KEY (symbol, row_id)
    )";
    const INSERT_SQL: &'static str = "INSERT OR REPLACE INTO canonical_rows
        (ts_ms, recv_ts_ms, symbol, row_id, schema_version, kind, payload)
        VALUES (?1,?2,?3,?4,?5,?6,?7)";

    fn to_params(&self) -> Vec<rusqlite::types::Value> {
        use rusqlite::types::Value;
        vec![
            Value::Integer(self.ts_ms),
            Value::Integer(self.recv_ts_ms),
            Value::Text(self.symbol.to_string()),
            Value::Integer(self.row_id as i64),
            Value::Integer(self.schema_version as i64),
            Value::Text(self.kind().to_string()),
            Value::Text(serde_json::to_string(&self.payload).unwrap_or_default()),
        ]
    }
}

impl flowcore_integration::sink::ParityTags for CanonicalRow {
    fn parity_tags(&self) -> Vec<&'static str> {
        let mut tags = vec!["total"];
        match self.kind() {
            Kind::Trade => tags.push("trade_count"),
            Kind::Orderbook => tags.push("orderbook_count"),
            Kind::Price => tags.push("price_count"),
            Kind::Feature => tags.push("feature_count"),
        }
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn depth_snapshot_detects_crossed_book() {
        let crossed = DepthSnapshot {
            bids: vec![DepthLevel { price: dec!(100.5), qty: dec!(1) }],
            asks: vec![DepthLevel { price: dec!(100.0), qty: dec!(1) }],
        };
        assert!(crossed.is_crossed());

        let sane = DepthSnapshot {
            bids: vec![DepthLevel { price: dec!(99.9), qty: dec!(1) }],
            asks: vec![DepthLevel { price: dec!(100.1), qty: dec!(1) }],
        };
        assert!(!sane.is_crossed());
    }

    #[test]
    fn depth_snapshot_spread_bps() {
        let book = DepthSnapshot {
            bids: vec![DepthLevel { price: dec!(100.0), qty: dec!(1) }],
            asks: vec![DepthLevel { price: dec!(100.1), qty: dec!(1) }],
        };
        let spread = book.spread_bps().unwrap();
        assert!((spread - 9.99000999).abs() < 1e-3);
    }

    #[test]
    fn canonical_row_roundtrips_through_json() {
        let row = CanonicalRow::new(
            1_000,
            1_005,
            "BTCUSDT",
            1,
            RowPayload::Trade(TradeRow { price: dec!(100), qty: dec!(1), side: Side::Buy, is_maker: false }),
        );
        let json = serde_json::to_string(&row).unwrap();
        let back: CanonicalRow = serde_json::from_str(&json).unwrap();
        assert_eq!(row, back);
        assert_eq!(back.kind(), Kind::Trade);
    }
}
