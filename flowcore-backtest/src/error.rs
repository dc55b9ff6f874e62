use thiserror::Error;

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("failed to load historical feature data: {0}")]
    Loader(String),

    #[error("market data source is empty")]
    EmptyMarketData,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink error: {0}")]
    Sink(#[from] flowcore_integration::IoError),
}
