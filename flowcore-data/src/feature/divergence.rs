use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Classification of price vs. order-flow divergence over a rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum Divergence {
    BullishDiv,
    BearishDiv,
    None,
}

/// Tracks a rolling window of `(price, flow_score)` pairs and classifies
/// the slope disagreement between price and order-flow (fused OFI/CVD) as
/// a divergence (§4.1 "Divergence").
#[derive(Debug, Clone)]
pub struct DivergenceDetector {
    window: usize,
    samples: VecDeque<(f64, f64)>,
}

impl DivergenceDetector {
    pub fn new(window: usize) -> Self {
        Self { window: window.max(2), samples: VecDeque::with_capacity(window) }
    }

    pub fn update(&mut self, price: f64, flow_score: f64) -> Divergence {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back((price, flow_score));

        if self.samples.len() < self.window {
            return Divergence::None;
        }

        let price_slope = slope(self.samples.iter().map(|(p, _)| *p));
        let flow_slope = slope(self.samples.iter().map(|(_, f)| *f));

        if price_slope < 0.0 && flow_slope > 0.0 {
            Divergence::BullishDiv
        } else if price_slope > 0.0 && flow_slope < 0.0 {
            Divergence::BearishDiv
        } else {
            Divergence::None
        }
    }
}

/// Ordinary least squares slope of `y` against its index.
fn slope(values: impl Iterator<Item = f64>) -> f64 {
    let ys: Vec<f64> = values.collect();
    let n = ys.len() as f64;
    if n < 2.0 {
        return 0.0;
    }
    let xs: Vec<f64> = (0..ys.len()).map(|i| i as f64).collect();
    let x_mean = xs.iter().sum::<f64>() / n;
    let y_mean = ys.iter().sum::<f64>() / n;

    let mut num = 0.0;
    let mut den = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        num += (x - x_mean) * (y - y_mean);
        den += (x - x_mean).powi(2);
    }

    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falling_price_with_rising_flow_is_bullish_divergence() {
        let mut det = DivergenceDetector::new(5);
        let mut last = Divergence::None;
        for i in 0..5 {
            last = det.update(100.0 - i as f64, i as f64);
        }
        assert_eq!(last, Divergence::BullishDiv);
    }

    #[test]
    fn rising_price_with_falling_flow_is_bearish_divergence() {
        let mut det = DivergenceDetector::new(5);
        let mut last = Divergence::None;
        for i in 0..5 {
            last = det.update(100.0 + i as f64, -(i as f64));
        }
        assert_eq!(last, Divergence::BearishDiv);
    }

    #[test]
    fn aligned_slopes_have_no_divergence() {
        let mut det = DivergenceDetector::new(5);
        let mut last = Divergence::None;
        for i in 0..5 {
            last = det.update(100.0 + i as f64, i as f64);
        }
        assert_eq!(last, Divergence::None);
    }
}
