use flowcore_integration::backoff::JitteredBackoff;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;

/// `on_failure` restart policy for one worker (§4.5 "Restart policy:
/// `on_failure` with backoff and `max_restarts` per worker").
#[derive(Debug, Clone)]
pub struct RestartPolicy {
    pub max_restarts: u32,
    backoff: JitteredBackoff,
    rng: Arc<Mutex<StdRng>>,
}

impl RestartPolicy {
    pub fn new(max_restarts: u32, base: Duration, cap: Duration, seed: u64) -> Self {
        Self {
            max_restarts,
            backoff: JitteredBackoff::new(base, cap),
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let mut rng = self.rng.lock();
        self.backoff.delay(attempt, &mut *rng)
    }

    pub fn exhausted(&self, attempts_so_far: u32) -> bool {
        attempts_so_far >= self.max_restarts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_trips_at_max_restarts() {
        let policy = RestartPolicy::new(3, Duration::from_millis(10), Duration::from_secs(1), 1);
        assert!(!policy.exhausted(0));
        assert!(!policy.exhausted(2));
        assert!(policy.exhausted(3));
        assert!(policy.exhausted(4));
    }

    #[test]
    fn delay_is_bounded_by_cap() {
        let policy = RestartPolicy::new(5, Duration::from_millis(50), Duration::from_millis(500), 7);
        for attempt in 0..10 {
            assert!(policy.delay_for_attempt(attempt) <= Duration::from_millis(500));
        }
    }
}
