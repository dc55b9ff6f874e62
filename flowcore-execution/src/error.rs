use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("adapter error: {0}")]
    Adapter(#[from] crate::adapter::AdapterError),

    #[error("outbox io error: {0}")]
    Io(#[from] flowcore_integration::IoError),

    #[error("order rejected: {0}")]
    Rejected(crate::order::RejectReason),
}
