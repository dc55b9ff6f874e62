use flowcore_data::canonical::Scenario2x2;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

pub const SCHEMA_SIGNAL_RECORD: &str = "signal/v2";

/// Low-cardinality decision outcome, safe as a metric label (§7). `Display`
/// (via `thiserror`) emits the same snake_case tag `serde` uses, so the
/// JSONL and SQLite sinks agree on the stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum DecisionCode {
    #[error("ok")]
    Ok,
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
    #[error("weak_signal_throttle")]
    WeakSignalThrottle,
    #[error("deduped")]
    Deduped,
    #[error("cooldown_blocked")]
    CooldownBlocked,
    #[error("rearm_margin_blocked")]
    RearmMarginBlocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    None,
    Normal,
    Strong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Buy,
    StrongBuy,
    Sell,
    StrongSell,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    Active,
    Quiet,
}

/// Signal Generator output, one per feature row (§3 "SignalRecord").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalRecord {
    pub ts_ms: i64,
    pub symbol: SmolStr,
    pub signal_row_id: u64,
    pub config_hash: String,
    pub rules_ver: String,
    pub features_ver: String,

    pub score: f64,
    pub side: Side,
    pub strength: Strength,
    pub signal_type: SignalType,
    pub confirm: bool,
    pub gating: bool,
    pub decision_code: DecisionCode,
    pub guard_reason: Option<DecisionCode>,

    pub regime: Regime,
    pub scenario: Scenario2x2,
    pub consistency: f64,
    pub warmup: bool,
    pub weak_signal_throttle: bool,
}

impl flowcore_integration::ParityTags for SignalRecord {
    fn parity_tags(&self) -> Vec<&'static str> {
        let mut tags = vec!["total"];
        match self.side {
            Side::Buy => tags.push("buy_count"),
            Side::Sell => tags.push("sell_count"),
            Side::None => {}
        }
        match self.strength {
            Strength::Strong => tags.push("strong_count"),
            _ => {}
        }
        if self.gating {
            tags.push("gating_breakdown");
        }
        tags
    }
}

impl flowcore_integration::sink::sqlite::SqlRecord for SignalRecord {
    const TABLE: &'static str = "signals";
    const CREATE_SQL: &'static str = "CREATE TABLE IF NOT EXISTS signals (
        ts_ms INTEGER NOT NULL,
        symbol TEXT NOT NULL,
        signal_row_id TEXT PRIMARY KEY,
        config_hash TEXT NOT NULL,
        score REAL NOT NULL,
        side TEXT NOT NULL,
        strength TEXT NOT NULL,
        signal_type TEXT NOT NULL,
        confirm INTEGER NOT NULL,
        gating INTEGER NOT NULL,
        decision_code TEXT NOT NULL,
        guard_reason TEXT,
        regime TEXT NOT NULL,
        scenario TEXT NOT NULL,
        consistency REAL NOT NULL,
        warmup INTEGER NOT NULL,
        weak_signal_throttle INTEGER NOT NULL,
        _feature_data TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_signals_symbol_ts ON signals (symbol, ts_ms)";
    const INSERT_SQL: &'static str = "INSERT OR REPLACE INTO signals
        (ts_ms, symbol, signal_row_id, config_hash, score, side, strength, signal_type,
         confirm, gating, decision_code, guard_reason, regime, scenario, consistency,
         warmup, weak_signal_throttle, _feature_data)
        VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)";

    fn to_params(&self) -> Vec<rusqlite::types::Value> {
        use rusqlite::types::Value;
        vec![
            Value::Integer(self.ts_ms),
            Value::Text(self.symbol.to_string()),
            Value::Text(self.signal_row_id.to_string()),
            Value::Text(self.config_hash.clone()),
            Value::Real(self.score),
            Value::Text(self.side.to_string()),
            Value::Text(self.strength.to_string()),
            Value::Text(self.signal_type.to_string()),
            Value::Integer(self.confirm as i64),
            Value::Integer(self.gating as i64),
            Value::Text(self.decision_code.to_string()),
            self.guard_reason.map(|g| Value::Text(g.to_string())).unwrap_or(Value::Null),
            Value::Text(self.regime.to_string()),
            Value::Text(self.scenario.to_string()),
            Value::Real(self.consistency),
            Value::Integer(self.warmup as i64),
            Value::Integer(self.weak_signal_throttle as i64),
            Value::Text(serde_json::to_string(self).unwrap_or_default()),
        ]
    }
}
