use crate::record::SignalType;
use fnv::FnvHashMap;
use smol_str::SmolStr;

/// Daily dedupe set: suppresses identical `(symbol, signal_type)` pairs
/// emitted within `dedupe_ms` of each other (§4.2 step 8). Persists across
/// sink rotations since it lives for the process lifetime, not per-file.
#[derive(Debug, Default)]
pub struct DedupeSet {
    last_emitted: FnvHashMap<(SmolStr, SignalType), i64>,
}

impl DedupeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `(symbol, signal_type)` was already emitted within
    /// `dedupe_ms` and should be suppressed. Does not record the attempt —
    /// call [`DedupeSet::record`] once the caller decides to actually emit.
    pub fn is_duplicate(&self, symbol: &SmolStr, signal_type: SignalType, ts_ms: i64, dedupe_ms: i64) -> bool {
        match self.last_emitted.get(&(symbol.clone(), signal_type)) {
            Some(&last_ts) => ts_ms - last_ts < dedupe_ms,
            None => false,
        }
    }

    pub fn record(&mut self, symbol: &SmolStr, signal_type: SignalType, ts_ms: i64) {
        self.last_emitted.insert((symbol.clone(), signal_type), ts_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_within_window_is_suppressed() {
        let mut set = DedupeSet::new();
        let sym = SmolStr::new("BTC-USD");
        set.record(&sym, SignalType::Buy, 1_000);
        assert!(set.is_duplicate(&sym, SignalType::Buy, 1_100, 250));
        assert!(!set.is_duplicate(&sym, SignalType::Buy, 1_300, 250));
    }

    #[test]
    fn different_signal_types_do_not_collide() {
        let mut set = DedupeSet::new();
        let sym = SmolStr::new("BTC-USD");
        set.record(&sym, SignalType::Buy, 1_000);
        assert!(!set.is_duplicate(&sym, SignalType::Sell, 1_050, 250));
    }
}
