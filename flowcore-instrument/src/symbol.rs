use derive_more::{Constructor, Display};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Interned symbol identifier (e.g. `"BTCUSDT"`).
///
/// Backed by [`SmolStr`] so cloning a `Symbol` into every `CanonicalRow`
/// never touches the heap for the short tickers a futures exchange uses.
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display, Constructor,
)]
#[serde(transparent)]
pub struct Symbol(SmolStr);

impl Symbol {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self(SmolStr::new(value))
    }
}

impl From<String> for Symbol {
    fn from(value: String) -> Self {
        Self(SmolStr::new(value))
    }
}

/// Schema version stamped on every produced record so downstream readers can
/// detect a breaking format change before it silently corrupts a sink.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Constructor,
)]
#[serde(transparent)]
pub struct SchemaVersion(pub u16);

impl SchemaVersion {
    /// Current `CanonicalRow` schema version.
    pub const CANONICAL_ROW: SchemaVersion = SchemaVersion(1);
    /// Current `SignalRecord` schema version (`signal/v2` per §3).
    pub const SIGNAL_RECORD: SchemaVersion = SchemaVersion(2);
    /// Current `ExecLogEvent` schema version.
    pub const EXEC_LOG_EVENT: SchemaVersion = SchemaVersion(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_round_trips_through_json() {
        let symbol = Symbol::from("BTCUSDT");
        let json = serde_json::to_string(&symbol).unwrap();
        let back: Symbol = serde_json::from_str(&json).unwrap();
        assert_eq!(symbol, back);
        assert_eq!(symbol.as_str(), "BTCUSDT");
    }
}
