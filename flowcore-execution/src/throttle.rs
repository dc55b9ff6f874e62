use flowcore_signal::record::Regime;
use std::collections::VecDeque;

/// Tunables for the [`AdaptiveThrottler`] (§4.3 "Adaptive Throttler", §8 P7).
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct ThrottlerConfig {
    pub base_rate_limit: f64,
    pub min_rate_limit: f64,
    pub max_rate_limit: f64,
    /// Number of recent accept/deny outcomes the rolling `deny_rate` is
    /// computed over.
    pub window_size: usize,
}

impl Default for ThrottlerConfig {
    fn default() -> Self {
        Self {
            base_rate_limit: 10.0,
            min_rate_limit: 1.0,
            max_rate_limit: 50.0,
            window_size: 100,
        }
    }
}

/// Sliding-window rate limiter whose target rate adapts to the rolling
/// deny rate and the active market regime (§4.3).
///
/// `deny_rate > 50%` halves the multiplier, `deny_rate < 10%` grows it by
/// 20%, both clamped so the effective rate never leaves
/// `[min_rate_limit, max_rate_limit]` (§8 P7). The active regime scales the
/// effective rate further: quiet markets get half the computed rate, active
/// markets get 1.5x, matching the spec's own factors.
#[derive(Debug)]
pub struct AdaptiveThrottler {
    config: ThrottlerConfig,
    outcomes: VecDeque<bool>,
    multiplier: f64,
}

impl AdaptiveThrottler {
    pub fn new(config: ThrottlerConfig) -> Self {
        Self { config, outcomes: VecDeque::with_capacity(config.window_size), multiplier: 1.0 }
    }

    /// Record whether the most recent submission attempt was denied
    /// (rejected by risk precheck or the exchange), then re-derive the
    /// multiplier from the rolling deny rate.
    pub fn record_outcome(&mut self, denied: bool) {
        if self.outcomes.len() >= self.config.window_size {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(denied);
        self.adjust();
    }

    fn deny_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        self.outcomes.iter().filter(|&&d| d).count() as f64 / self.outcomes.len() as f64
    }

    fn adjust(&mut self) {
        let deny_rate = self.deny_rate();
        if deny_rate > 0.5 {
            self.multiplier *= 0.5;
        } else if deny_rate < 0.1 {
            self.multiplier *= 1.2;
        }
        let unscaled_min = self.config.min_rate_limit / self.config.base_rate_limit;
        let unscaled_max = self.config.max_rate_limit / self.config.base_rate_limit;
        self.multiplier = self.multiplier.clamp(unscaled_min, unscaled_max);
    }

    /// Current effective rate limit (requests/second) given the active
    /// market regime, clamped to `[min_rate_limit, max_rate_limit]`.
    pub fn current_rate_limit(&self, regime: Regime) -> f64 {
        let activity_scale = match regime {
            Regime::Active => 1.5,
            Regime::Quiet => 0.5,
        };
        (self.config.base_rate_limit * self.multiplier * activity_scale)
            .clamp(self.config.min_rate_limit, self.config.max_rate_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_stays_within_configured_bounds_under_heavy_denial() {
        let config = ThrottlerConfig { base_rate_limit: 10.0, min_rate_limit: 1.0, max_rate_limit: 50.0, window_size: 20 };
        let mut throttler = AdaptiveThrottler::new(config);
        for _ in 0..200 {
            throttler.record_outcome(true);
            let rate = throttler.current_rate_limit(Regime::Active);
            assert!(rate >= config.min_rate_limit && rate <= config.max_rate_limit);
        }
    }

    #[test]
    fn rate_stays_within_configured_bounds_under_low_denial() {
        let config = ThrottlerConfig { base_rate_limit: 10.0, min_rate_limit: 1.0, max_rate_limit: 50.0, window_size: 20 };
        let mut throttler = AdaptiveThrottler::new(config);
        for _ in 0..200 {
            throttler.record_outcome(false);
            let rate = throttler.current_rate_limit(Regime::Active);
            assert!(rate >= config.min_rate_limit && rate <= config.max_rate_limit);
        }
    }

    #[test]
    fn quiet_regime_scales_down_relative_to_active() {
        let throttler = AdaptiveThrottler::new(ThrottlerConfig::default());
        assert!(throttler.current_rate_limit(Regime::Quiet) < throttler.current_rate_limit(Regime::Active));
    }

    #[test]
    fn high_deny_rate_lowers_the_effective_rate() {
        let mut throttler = AdaptiveThrottler::new(ThrottlerConfig::default());
        let before = throttler.current_rate_limit(Regime::Active);
        for _ in 0..20 {
            throttler.record_outcome(true);
        }
        let after = throttler.current_rate_limit(Regime::Active);
        assert!(after < before);
    }
}
