use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{interval, timeout, MissedTickBehavior};

/// A one-shot signal that a worker has finished initialising and is safe to
/// depend on downstream (§4.5 "reports readiness when first rows ... arrive").
///
/// Both variants poll rather than subscribe: the orchestrator is a separate
/// OS process from the worker it supervises, so a sentinel file or a log
/// line are the only readiness channels that cross that boundary without a
/// bespoke IPC mechanism (§1 non-goals exclude inventing one).
#[derive(Debug, Clone)]
pub enum ReadyProbe {
    /// Ready once `path` exists (a worker touches this file, or it is the
    /// first `ready/` output file itself, once its first row/signal/order
    /// has been durably published).
    SentinelFile { path: PathBuf },
    /// Ready once `keyword` appears anywhere in `log_path`'s current
    /// contents.
    LogKeyword { log_path: PathBuf, keyword: String },
    /// Always ready immediately — used in replay mode (§4.1 "OR when replay
    /// mode is active") and for workers with no external readiness signal.
    Immediate,
}

impl ReadyProbe {
    /// Poll until ready or `budget` elapses.
    pub async fn wait(&self, budget: Duration) -> bool {
        match self {
            ReadyProbe::Immediate => true,
            ReadyProbe::SentinelFile { path } => {
                let path = path.clone();
                timeout(budget, poll_until(move || path.exists())).await.is_ok()
            }
            ReadyProbe::LogKeyword { log_path, keyword } => {
                let log_path = log_path.clone();
                let keyword = keyword.clone();
                timeout(budget, poll_until(move || log_contains(&log_path, &keyword))).await.is_ok()
            }
        }
    }
}

/// Periodic liveness check run for the lifetime of a worker (§4.5 "periodic
/// check: file count, recent mtime, or log keyword pattern").
#[derive(Debug, Clone)]
pub enum HealthProbe {
    /// Healthy as long as `path`'s mtime is within `max_staleness` of now.
    RecentMtime { path: PathBuf, max_staleness: Duration },
    /// Healthy as long as the directory contains at least `min_count`
    /// entries (a worker that stops producing `ready/` files is stalled
    /// even if its process is still running).
    FileCount { dir: PathBuf, min_count: usize },
    /// Healthy as long as `log_path` contains `keyword` more recently than
    /// it did on the previous check cycle is not tracked here; presence is
    /// treated as sufficient (mirrors `ReadyProbe::LogKeyword`'s semantics).
    LogKeyword { log_path: PathBuf, keyword: String },
    /// No liveness check beyond "process still running".
    None,
}

impl HealthProbe {
    pub fn check(&self) -> bool {
        match self {
            HealthProbe::None => true,
            HealthProbe::RecentMtime { path, max_staleness } => std::fs::metadata(path)
                .and_then(|m| m.modified())
                .map(|modified| modified.elapsed().map(|age| age <= *max_staleness).unwrap_or(false))
                .unwrap_or(false),
            HealthProbe::FileCount { dir, min_count } => std::fs::read_dir(dir)
                .map(|entries| entries.count() >= *min_count)
                .unwrap_or(false),
            HealthProbe::LogKeyword { log_path, keyword } => log_contains(log_path, keyword),
        }
    }

    /// Run [`Self::check`] on `interval_period`, invoking `on_unhealthy` the
    /// first time a check fails. Runs until cancelled via `cancel`.
    pub async fn monitor(&self, interval_period: Duration, mut cancel: tokio::sync::watch::Receiver<bool>, mut on_unhealthy: impl FnMut()) {
        let mut ticker = interval(interval_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.check() {
                        on_unhealthy();
                    }
                }
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        return;
                    }
                }
            }
        }
    }
}

fn log_contains(path: &std::path::Path, keyword: &str) -> bool {
    std::fs::read_to_string(path).map(|contents| contents.contains(keyword)).unwrap_or(false)
}

async fn poll_until(mut predicate: impl FnMut() -> bool) {
    let mut ticker = interval(Duration::from_millis(100));
    loop {
        if predicate() {
            return;
        }
        ticker.tick().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn immediate_probe_is_always_ready() {
        assert!(ReadyProbe::Immediate.wait(Duration::from_millis(1)).await);
    }

    #[tokio::test]
    async fn sentinel_file_probe_waits_for_file_creation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("READY");
        let probe = ReadyProbe::SentinelFile { path: path.clone() };
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            std::fs::write(path, b"").unwrap();
        });
        assert!(probe.wait(Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn sentinel_file_probe_times_out_when_file_never_appears() {
        let dir = tempfile::tempdir().unwrap();
        let probe = ReadyProbe::SentinelFile { path: dir.path().join("NEVER") };
        assert!(!probe.wait(Duration::from_millis(200)).await);
    }

    #[test]
    fn file_count_health_probe_reports_unhealthy_below_minimum() {
        let dir = tempfile::tempdir().unwrap();
        let probe = HealthProbe::FileCount { dir: dir.path().to_path_buf(), min_count: 1 };
        assert!(!probe.check());
        std::fs::write(dir.path().join("a.jsonl"), b"{}").unwrap();
        assert!(probe.check());
    }
}
