#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! Orchestrator: supervises the Harvester, Signal Generator,
//! Strategy/Risk/Executor and Backtest/Report workers as a single run —
//! ordered start with readiness probes, periodic health checks, an
//! `on_failure` restart policy with backoff, reverse-order graceful
//! shutdown, and consolidated run/source manifests (§4.5).

pub mod error;
pub mod manifest;
pub mod probe;
pub mod restart;
pub mod supervisor;
pub mod worker;

pub use error::OrchestratorError;
pub use manifest::{RunManifest, SourceManifest};
pub use probe::{HealthProbe, ReadyProbe};
pub use restart::RestartPolicy;
pub use supervisor::{RunOutcome, Supervisor};
pub use worker::{WorkerName, WorkerSpec, WORKER_ORDER};
