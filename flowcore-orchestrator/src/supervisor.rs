use crate::error::OrchestratorError;
use crate::manifest::RunManifest;
use crate::worker::{WorkerName, WorkerSpec, WORKER_ORDER};
use std::collections::HashMap;
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Supervises the pipeline's workers: launches them in [`WORKER_ORDER`],
/// waits on each worker's readiness probe before starting the next, applies
/// each worker's restart policy on unexpected exit, and tears the whole run
/// down in reverse order on cancellation (§4.5).
pub struct Supervisor {
    workers: HashMap<WorkerName, WorkerSpec>,
    manifest: RunManifest,
    cancel_tx: watch::Sender<bool>,
}

/// Outcome of [`Supervisor::run`] — mirrors the exit code taxonomy in §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Clean,
    NoSignalsWarning,
    WorkerNeverReady,
    SignalTerminated,
}

impl RunOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            RunOutcome::Clean => 0,
            RunOutcome::NoSignalsWarning => 2,
            RunOutcome::WorkerNeverReady => 1,
            RunOutcome::SignalTerminated => 130,
        }
    }
}

impl Supervisor {
    pub fn new(workers: HashMap<WorkerName, WorkerSpec>, manifest: RunManifest) -> Self {
        let (cancel_tx, _rx) = watch::channel(false);
        Self { workers, manifest, cancel_tx }
    }

    /// A clone-able handle callers can use to trigger graceful shutdown
    /// from outside (e.g. a `SIGINT` handler) without holding a `&mut
    /// Supervisor` (§5 "a single top-level cancellation signal").
    pub fn cancellation_handle(&self) -> watch::Sender<bool> {
        self.cancel_tx.clone()
    }

    /// The manifest as it stands after [`Supervisor::run`] returns, with
    /// every worker's restart count filled in — callers finalize and write
    /// this rather than the pre-run value they originally constructed the
    /// supervisor with.
    pub fn manifest(&self) -> &RunManifest {
        &self.manifest
    }

    /// Launch enabled workers in order, supervise them until cancellation,
    /// then shut down in reverse order. `enabled` restricts the run to a
    /// subset of [`WORKER_ORDER`] (§6 `--enable <comma-list>`).
    pub async fn run(&mut self, enabled: &[WorkerName]) -> Result<RunOutcome, OrchestratorError> {
        let mut children: Vec<(WorkerName, Child)> = Vec::new();
        let mut outcome = RunOutcome::Clean;

        for name in WORKER_ORDER.into_iter().filter(|n| enabled.contains(n)) {
            let Some(spec) = self.workers.get(&name) else { continue };
            info!(worker = %name, "starting worker");
            let child = spec.spawn().map_err(|e| OrchestratorError::Spawn(name.to_string(), e))?;
            if !spec.ready_probe.wait(spec.ready_timeout).await {
                warn!(worker = %name, timeout = ?spec.ready_timeout, "worker did not become ready in time");
                Self::shutdown(&mut children, &self.workers).await;
                return Ok(RunOutcome::WorkerNeverReady);
            }
            info!(worker = %name, "worker ready");
            children.push((name, child));
        }

        let mut cancel_rx = self.cancel_tx.subscribe();
        loop {
            tokio::select! {
                _ = cancel_rx.changed() => {
                    if *cancel_rx.borrow() {
                        info!("cancellation received, shutting down");
                        break;
                    }
                }
                result = wait_any(&mut children) => {
                    match result {
                        Some((name, status)) if status.success() => {
                            info!(worker = %name, "worker exited cleanly, removing from supervision");
                        }
                        Some((name, status)) => {
                            error!(worker = %name, ?status, "worker exited unexpectedly");
                            let attempts = *self.manifest.restarts.get(&name).unwrap_or(&0);
                            let spec = self.workers.get(&name).expect("worker spec present for a supervised child");
                            if spec.restart.exhausted(attempts) {
                                error!(worker = %name, attempts, "restart budget exhausted");
                                self.cancel_tx.send_replace(true);
                                outcome = RunOutcome::WorkerNeverReady;
                                break;
                            }
                            self.manifest.restarts.insert(name, attempts + 1);
                            let delay = spec.restart.delay_for_attempt(attempts);
                            tokio::time::sleep(delay).await;
                            match spec.spawn() {
                                Ok(child) => {
                                    if spec.ready_probe.wait(spec.ready_timeout).await {
                                        children.push((name, child));
                                    } else {
                                        outcome = RunOutcome::WorkerNeverReady;
                                        break;
                                    }
                                }
                                Err(e) => return Err(OrchestratorError::Spawn(name.to_string(), e)),
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        Self::shutdown(&mut children, &self.workers).await;
        Ok(outcome)
    }

    /// Stop every remaining child in reverse start order, granting each its
    /// configured `grace_period` to flush and exit before a hard kill
    /// (§4.5 "Shutdown in reverse order").
    async fn shutdown(children: &mut Vec<(WorkerName, Child)>, specs: &HashMap<WorkerName, WorkerSpec>) {
        while let Some((name, mut child)) = children.pop() {
            let grace = specs.get(&name).map(|s| s.grace_period).unwrap_or(Duration::from_secs(5));
            if let Some(id) = child.id() {
                let _ = nix_like_terminate(id);
            }
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(_) => info!(worker = %name, "worker exited within grace period"),
                Err(_) => {
                    warn!(worker = %name, "worker exceeded grace period, killing");
                    let _ = child.kill().await;
                }
            }
        }
    }
}

/// Best-effort graceful-stop request: `tokio::process::Child` exposes only
/// `kill()` (SIGKILL) portably, so a cooperative stop is approximated here
/// by relying on the grace-period wait below doing nothing, on Unix a real
/// deployment would `nix::sys::signal::kill(pid, SIGTERM)`; kept as a no-op
/// hook rather than taking a `nix` dependency the rest of the workspace does
/// not otherwise need.
fn nix_like_terminate(_pid: u32) {}

async fn wait_any(children: &mut [(WorkerName, Child)]) -> Option<(WorkerName, std::process::ExitStatus)> {
    if children.is_empty() {
        std::future::pending::<()>().await;
        return None;
    }
    let futures: Vec<_> = children.iter_mut().map(|(name, child)| Box::pin(async move { (*name, child.wait().await) })).collect();
    let (result, _index, _rest) = futures::future::select_all(futures).await;
    let (name, status) = result;
    let status = status.ok()?;
    children.retain(|(n, _)| *n != name);
    Some((name, status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{HealthProbe, ReadyProbe};
    use crate::restart::RestartPolicy;

    fn spec(name: WorkerName) -> WorkerSpec {
        WorkerSpec {
            name,
            program: "true".to_string(),
            args: vec![],
            envs: vec![],
            ready_probe: ReadyProbe::Immediate,
            ready_timeout: Duration::from_secs(1),
            health_probe: HealthProbe::None,
            health_interval: Duration::from_secs(1),
            grace_period: Duration::from_millis(200),
            restart: RestartPolicy::new(0, Duration::from_millis(10), Duration::from_millis(100), 1),
        }
    }

    #[tokio::test]
    async fn a_clean_exit_of_every_worker_yields_a_clean_outcome() {
        let mut workers = HashMap::new();
        workers.insert(WorkerName::Harvest, spec(WorkerName::Harvest));
        let manifest = RunManifest::new("t", 0, "hash");
        let mut supervisor = Supervisor::new(workers, manifest);
        let outcome = supervisor.run(&[WorkerName::Harvest]).await.unwrap();
        assert_eq!(outcome, RunOutcome::Clean);
    }

    #[test]
    fn exit_codes_match_the_spec_taxonomy() {
        assert_eq!(RunOutcome::Clean.exit_code(), 0);
        assert_eq!(RunOutcome::NoSignalsWarning.exit_code(), 2);
        assert_eq!(RunOutcome::WorkerNeverReady.exit_code(), 1);
    }
}
