use thiserror::Error;

/// Errors produced while constructing or validating core identifiers.
#[derive(Debug, Clone, Error)]
pub enum InstrumentError {
    #[error("symbol must not be empty")]
    EmptySymbol,

    #[error("unknown exchange identifier: {0}")]
    UnknownExchange(String),
}
