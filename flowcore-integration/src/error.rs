use thiserror::Error;

/// Errors surfaced by the shared IO layer.
///
/// Rotation/rename conflicts and transient SQLite busy errors are retried
/// internally with backoff (§7 "recovered locally") before ever reaching a
/// caller as one of these variants.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to rotate spool file {path}: {source}")]
    Rotate {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("rotate/rename conflict on {0} exceeded retry budget")]
    RotateConflict(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
