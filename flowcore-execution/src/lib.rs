#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! Executor Layer: the order contract, idempotency tracker, adaptive
//! throttler, the abstract exchange wire contract, Backtest/Live executor
//! variants, the shadow-executor comparison wrapper and the exec-log outbox
//! sink (§4.3, §4.4, §9).

pub mod adapter;
pub mod backtest;
pub mod error;
pub mod executor;
pub mod idempotency;
pub mod live;
pub mod order;
pub mod outbox;
pub mod shadow;
pub mod throttle;

pub use adapter::{AdapterError, CancelResult, ExchangeAdapter, Fill, MockAdapter, Position};
pub use backtest::{BacktestExecutor, FeeModel, FillOutcome, MidPriceSource, simulate_fill};
pub use error::ExecutionError;
pub use executor::{Executor, GuardedExecutor};
pub use idempotency::IdempotencyTracker;
pub use live::AdapterExecutor;
pub use order::{
    ClientOrderId, EventKind, ExecLogEvent, ExecResult, ExecStatus, OrderCtx, OrderType,
    RejectReason, Side, TimeInForce,
};
pub use outbox::Outbox;
pub use shadow::{ParityStats, ShadowExecutor};
pub use throttle::{AdaptiveThrottler, ThrottlerConfig};
