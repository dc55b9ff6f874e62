use chrono::{DateTime, Utc};
use std::time::Instant;

/// Sole source of time for every pipeline component (§5, §9).
///
/// No component may call `chrono::Utc::now()` or `Instant::now()` directly —
/// doing so would make Backtest replay diverge from Live and break the bit-
/// identical reproducibility required by P1. Live uses the wall clock;
/// Backtest drives `now_ms`/`monotonic` from the replay stream's event time.
pub trait TimeProvider: Send + Sync {
    /// Current wall-clock time in milliseconds since epoch.
    fn now_ms(&self) -> i64;

    /// A monotonically non-decreasing instant usable only for measuring
    /// elapsed durations (e.g. order round-trip latency), never for
    /// timestamps embedded in records.
    fn monotonic(&self) -> Instant;
}

/// Wall-clock [`TimeProvider`] used by the Live and Testnet executors and by
/// the Harvester when not in replay mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveClock;

impl TimeProvider for LiveClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn monotonic(&self) -> Instant {
        Instant::now()
    }
}

/// Simulated [`TimeProvider`] driven externally by the Backtest replay
/// stream's event time. `monotonic()` is synthesised from an `Instant`
/// captured once at construction plus the elapsed simulated milliseconds,
/// so duration arithmetic (e.g. `Instant::elapsed`) still behaves sensibly
/// in code paths shared with Live.
#[derive(Debug, Clone)]
pub struct SimClock {
    current_ms: i64,
    origin: Instant,
    origin_ms: i64,
}

impl SimClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            current_ms: start_ms,
            origin: Instant::now(),
            origin_ms: start_ms,
        }
    }

    /// Advance simulated time to `ts_ms`. No-op (and does not regress) if
    /// `ts_ms` is behind the current simulated clock.
    pub fn advance_to(&mut self, ts_ms: i64) {
        if ts_ms > self.current_ms {
            self.current_ms = ts_ms;
        }
    }

    pub fn current_ms(&self) -> i64 {
        self.current_ms
    }
}

impl TimeProvider for SimClock {
    fn now_ms(&self) -> i64 {
        self.current_ms
    }

    fn monotonic(&self) -> Instant {
        let delta_ms = (self.current_ms - self.origin_ms).max(0) as u64;
        self.origin + std::time::Duration::from_millis(delta_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct UtcMillis(pub i64);

impl UtcMillis {
    pub fn to_datetime(self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.0).unwrap_or_default()
    }
}
