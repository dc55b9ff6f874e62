use flowcore_ta::RollingZScore;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Tick-rule direction classified for a trade whose price did not move,
/// bounded by a maximum propagation length and elapsed time (§9 decision:
/// `max_len = 5`, `max_time_ms = 2000` by default).
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct PropagationCap {
    pub max_len: u32,
    pub max_time_ms: i64,
}

impl Default for PropagationCap {
    fn default() -> Self {
        Self { max_len: 5, max_time_ms: 2_000 }
    }
}

/// Cumulative Volume Delta: tick-rule classified signed volume accumulated
/// over a rolling z-score window.
#[derive(Debug, Clone)]
pub struct CvdCalculator {
    cap: PropagationCap,
    last_price: Option<Decimal>,
    last_sign: i64,
    propagated: u32,
    last_ts_ms: i64,
    cumulative: f64,
    zscore: RollingZScore,
}

impl CvdCalculator {
    pub fn new(window: usize, cap: PropagationCap) -> Self {
        Self {
            cap,
            last_price: None,
            last_sign: 0,
            propagated: 0,
            last_ts_ms: 0,
            cumulative: 0.0,
            zscore: RollingZScore::new(window),
        }
    }

    /// Classify a trade by the tick rule and fold its signed volume into
    /// the cumulative total, returning `(cumulative_delta, z_cvd)`.
    pub fn update(&mut self, ts_ms: i64, price: Decimal, qty: Decimal) -> (f64, Option<f64>) {
        let qty_f = qty.to_f64().unwrap_or_default();
        let sign = match self.last_price {
            None => 1,
            Some(prev) => match price.cmp(&prev) {
                std::cmp::Ordering::Greater => 1,
                std::cmp::Ordering::Less => -1,
                std::cmp::Ordering::Equal => self.propagate(ts_ms),
            },
        };

        if sign != 0 {
            self.cumulative += sign as f64 * qty_f;
        }
        self.last_sign = sign;
        self.last_price = Some(price);
        self.last_ts_ms = ts_ms;

        let z = self.zscore.update(self.cumulative);
        (self.cumulative, z)
    }

    fn propagate(&mut self, ts_ms: i64) -> i64 {
        let elapsed = ts_ms - self.last_ts_ms;
        if self.last_sign != 0 && self.propagated < self.cap.max_len && elapsed <= self.cap.max_time_ms {
            self.propagated += 1;
            self.last_sign
        } else {
            self.propagated = 0;
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn uptick_is_classified_positive() {
        let mut cvd = CvdCalculator::new(10, PropagationCap::default());
        cvd.update(0, dec!(100), dec!(1));
        let (cum, _) = cvd.update(10, dec!(101), dec!(2));
        assert_eq!(cum, 3.0);
    }

    #[test]
    fn downtick_is_classified_negative() {
        let mut cvd = CvdCalculator::new(10, PropagationCap::default());
        cvd.update(0, dec!(100), dec!(1));
        let (cum, _) = cvd.update(10, dec!(99), dec!(2));
        assert_eq!(cum, -1.0);
    }

    #[test]
    fn unchanged_price_propagates_prior_direction_within_cap() {
        let mut cvd = CvdCalculator::new(10, PropagationCap { max_len: 2, max_time_ms: 1_000 });
        cvd.update(0, dec!(100), dec!(1));
        cvd.update(10, dec!(101), dec!(1)); // uptick, sign=+1, cum=2
        cvd.update(20, dec!(101), dec!(1)); // propagated #1, cum=3
        let (cum, _) = cvd.update(30, dec!(101), dec!(1)); // propagated #2, cum=4
        assert_eq!(cum, 4.0);
        // third repeat exceeds max_len -> neutral, no change
        let (cum, _) = cvd.update(40, dec!(101), dec!(1));
        assert_eq!(cum, 4.0);
    }

    #[test]
    fn unchanged_price_beyond_time_cap_is_neutral() {
        let mut cvd = CvdCalculator::new(10, PropagationCap { max_len: 5, max_time_ms: 100 });
        cvd.update(0, dec!(100), dec!(1));
        cvd.update(10, dec!(101), dec!(1)); // cum=2
        let (cum, _) = cvd.update(5_000, dec!(101), dec!(1)); // far beyond time cap
        assert_eq!(cum, 2.0);
    }
}
