use thiserror::Error;

/// Errors surfaced while supervising workers (§4.5, §7 "fatal (worker exit,
/// orchestrator restart)").
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("worker '{0}' failed to spawn: {1}")]
    Spawn(String, std::io::Error),

    #[error("worker '{0}' did not reach ready state within {1:?}")]
    ReadyTimeout(String, std::time::Duration),

    #[error("worker '{0}' exhausted its restart budget ({1} attempts)")]
    RestartBudgetExhausted(String, u32),

    #[error("worker '{0}' exited with status {1}")]
    WorkerFailed(String, std::process::ExitStatus),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("manifest serialization error: {0}")]
    Manifest(#[from] serde_json::Error),
}
