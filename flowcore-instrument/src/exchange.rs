use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Identifies which execution venue a [`crate::symbol::Symbol`] or order is
/// routed through.
///
/// The CORE pipeline targets a single futures exchange in production, but
/// the executor layer (§4.3) requires the same `OrderCtx`/`ExecResult`
/// shapes to flow through three distinct execution modes plus an optional
/// shadow venue, so those modes are represented here rather than as a
/// boolean flag threaded through every call site.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeId {
    /// Deterministic in-process matching engine (§4.4).
    Backtest,
    /// Exchange sandbox / testnet credentials.
    Testnet,
    /// Production venue.
    Live,
    /// Mock venue used only in unit tests.
    Mock,
}

impl ExchangeId {
    /// `true` for execution modes that must never place a real order.
    pub fn is_paper(&self) -> bool {
        matches!(self, ExchangeId::Backtest | ExchangeId::Mock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paper_modes_are_identified() {
        assert!(ExchangeId::Backtest.is_paper());
        assert!(ExchangeId::Mock.is_paper());
        assert!(!ExchangeId::Live.is_paper());
        assert!(!ExchangeId::Testnet.is_paper());
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&ExchangeId::Live).unwrap();
        assert_eq!(json, "\"live\"");
    }
}
