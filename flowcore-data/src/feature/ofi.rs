use crate::canonical::DepthSnapshot;
use flowcore_ta::RollingZScore;
use rust_decimal::prelude::ToPrimitive;

/// Order Flow Imbalance: per-level signed imbalance derived from successive
/// top-of-book depth snapshots (Cont, Kukanov & Stoikov's contribution
/// function), fed through a rolling z-score.
#[derive(Debug, Clone)]
pub struct OfiCalculator {
    prev: Option<DepthSnapshot>,
    zscore: RollingZScore,
}

impl OfiCalculator {
    pub fn new(window: usize) -> Self {
        Self { prev: None, zscore: RollingZScore::new(window) }
    }

    /// Feed a new depth snapshot and return `(raw_ofi, z_ofi)`. `z_ofi` is
    /// `None` until the rolling window has at least two observations.
    pub fn update(&mut self, snapshot: &DepthSnapshot) -> (f64, Option<f64>) {
        let raw = match &self.prev {
            Some(prev) => contribution(prev, snapshot),
            None => 0.0,
        };
        self.prev = Some(snapshot.clone());
        let z = self.zscore.update(raw);
        (raw, z)
    }
}

fn contribution(prev: &DepthSnapshot, cur: &DepthSnapshot) -> f64 {
    let bid = side_contribution(prev.bids.first(), cur.bids.first());
    let ask = side_contribution(prev.asks.first(), cur.asks.first());
    bid - ask
}

fn side_contribution(prev: Option<&crate::canonical::DepthLevel>, cur: Option<&crate::canonical::DepthLevel>) -> f64 {
    let (prev, cur) = match (prev, cur) {
        (Some(p), Some(c)) => (p, c),
        _ => return 0.0,
    };
    let cur_price = cur.price.to_f64().unwrap_or_default();
    let prev_price = prev.price.to_f64().unwrap_or_default();
    let cur_qty = cur.qty.to_f64().unwrap_or_default();
    let prev_qty = prev.qty.to_f64().unwrap_or_default();

    use std::cmp::Ordering::*;
    match cur_price.partial_cmp(&prev_price).unwrap_or(Equal) {
        Greater => cur_qty,
        Equal => cur_qty - prev_qty,
        Less => -prev_qty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::DepthLevel;
    use rust_decimal_macros::dec;

    fn book(bid_px: &str, bid_qty: &str, ask_px: &str, ask_qty: &str) -> DepthSnapshot {
        DepthSnapshot {
            bids: vec![DepthLevel { price: bid_px.parse().unwrap(), qty: bid_qty.parse().unwrap() }],
            asks: vec![DepthLevel { price: ask_px.parse().unwrap(), qty: ask_qty.parse().unwrap() }],
        }
    }

    #[test]
    fn first_update_has_zero_raw_ofi() {
        let mut ofi = OfiCalculator::new(10);
        let (raw, z) = ofi.update(&book("100", "1", "101", "1"));
        assert_eq!(raw, 0.0);
        assert_eq!(z, None);
    }

    #[test]
    fn bid_size_increase_at_same_price_is_positive() {
        let mut ofi = OfiCalculator::new(10);
        ofi.update(&book("100", "1", "101", "1"));
        let (raw, _) = ofi.update(&book("100", "5", "101", "1"));
        assert_eq!(raw, 4.0);
    }

    #[test]
    fn ask_size_increase_at_same_price_is_negative() {
        let mut ofi = OfiCalculator::new(10);
        ofi.update(&book("100", "1", "101", "1"));
        let (raw, _) = ofi.update(&book("100", "1", "101", "5"));
        assert_eq!(raw, -4.0);
    }

    #[test]
    fn bid_price_improvement_counts_full_new_qty() {
        let mut ofi = OfiCalculator::new(10);
        ofi.update(&book("100", "1", "101", "1"));
        let (raw, _) = ofi.update(&book("100.5", "2", "101", "1"));
        assert_eq!(raw, 2.0);
    }
}
