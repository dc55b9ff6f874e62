use rand::Rng;
use std::time::Duration;

/// Capped-exponential backoff with full jitter, used for exchange reconnect
/// attempts (§4.1) and rotate/rename retries (§7 "recovered locally").
#[derive(Debug, Clone, Copy)]
pub struct JitteredBackoff {
    base: Duration,
    cap: Duration,
}

impl JitteredBackoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Delay for the given zero-indexed attempt number, with jitter applied
    /// uniformly over `[0, computed_delay]`.
    pub fn delay(&self, attempt: u32, rng: &mut impl Rng) -> Duration {
        let exp = self.base.saturating_mul(1u32.checked_shl(attempt.min(20)).unwrap_or(u32::MAX));
        let capped = exp.min(self.cap);
        let jitter_ms = rng.random_range(0..=capped.as_millis().max(1) as u64);
        Duration::from_millis(jitter_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn delay_is_bounded_by_cap() {
        let backoff = JitteredBackoff::new(Duration::from_millis(100), Duration::from_secs(5));
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for attempt in 0..30 {
            let delay = backoff.delay(attempt, &mut rng);
            assert!(delay <= Duration::from_secs(5));
        }
    }

    #[test]
    fn delay_grows_with_attempt_on_average() {
        let backoff = JitteredBackoff::new(Duration::from_millis(10), Duration::from_secs(10));
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let early: u128 = (0..50).map(|_| backoff.delay(0, &mut rng).as_millis()).sum();
        let late: u128 = (0..50).map(|_| backoff.delay(5, &mut rng).as_millis()).sum();
        assert!(late > early);
    }
}
