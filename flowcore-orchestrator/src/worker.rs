use crate::probe::{HealthProbe, ReadyProbe};
use crate::restart::RestartPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::process::{Child, Command};

/// One of the four supervised pipeline components, in their fixed launch
/// order (§4.5 "harvest → signal → strategy → broker → report"). `Report`
/// is the external collaborator named in §1's non-goals (rendering), but
/// the orchestrator still launches and supervises it as a worker — only its
/// *implementation* is out of core scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerName {
    Harvest,
    Signal,
    Strategy,
    Broker,
    Report,
}

impl fmt::Display for WorkerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerName::Harvest => "harvest",
            WorkerName::Signal => "signal",
            WorkerName::Strategy => "strategy",
            WorkerName::Broker => "broker",
            WorkerName::Report => "report",
        };
        f.write_str(s)
    }
}

/// The fixed start order for a run; [`WorkerName::Report`] is optional and
/// only included when the orchestrator's `--enable` list names it (§6 CLI
/// surface).
pub const WORKER_ORDER: [WorkerName; 5] =
    [WorkerName::Harvest, WorkerName::Signal, WorkerName::Strategy, WorkerName::Broker, WorkerName::Report];

/// Static description of how to launch and supervise one worker.
pub struct WorkerSpec {
    pub name: WorkerName,
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    pub ready_probe: ReadyProbe,
    pub ready_timeout: Duration,
    pub health_probe: HealthProbe,
    pub health_interval: Duration,
    pub grace_period: Duration,
    pub restart: RestartPolicy,
}

impl fmt::Debug for WorkerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerSpec")
            .field("name", &self.name)
            .field("program", &self.program)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

impl WorkerSpec {
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd.kill_on_drop(true);
        cmd
    }

    /// Spawn the worker's process. The returned [`Child`] is not yet known
    /// to be ready — callers should await [`WorkerSpec::ready_probe`]
    /// separately.
    pub fn spawn(&self) -> std::io::Result<Child> {
        self.command().spawn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_order_launches_harvest_first_and_report_last() {
        assert_eq!(WORKER_ORDER[0], WorkerName::Harvest);
        assert_eq!(WORKER_ORDER[4], WorkerName::Report);
    }

    #[test]
    fn display_matches_serde_tag() {
        for name in WORKER_ORDER {
            let json = serde_json::to_string(&name).unwrap();
            assert_eq!(json.trim_matches('"'), name.to_string());
        }
    }
}
