#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! Backtest Replay: a historical feature reader that feeds the live Signal
//! Generator/Risk/Executor stack through a deterministic matching engine,
//! producing bit-identical decisions to live and trades/pnl/metrics/manifest
//! outputs (§4.4, §8 P1).

pub mod error;
pub mod loader;
pub mod manifest;
pub mod market_data;
pub mod metrics;
pub mod replay;
pub mod sink;
pub mod trade;

pub use error::BacktestError;
pub use loader::{DataLoader, JsonLinesLoader, TimestampedRow};
pub use manifest::RunManifest;
pub use market_data::{BacktestMarketData, MarketDataInMemory};
pub use metrics::{compute_metrics, BacktestMetrics};
pub use replay::{BacktestConfig, BacktestRunOutput, BacktestRunner, SymbolFilters};
pub use sink::{daily_pnl, write_daily_pnl, DailyPnl, TradeSink};
pub use trade::{ClosedTrade, ExitPolicy, ExitReason, OpenTrade};
