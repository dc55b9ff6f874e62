#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! Harvester: canonical row model, OFI/CVD/Fusion/Divergence/Scenario
//! feature compute, and the data-quality gate that sits in front of the
//! dual sink.

pub mod books;
pub mod canonical;
pub mod dq;
pub mod exchange;
pub mod feature;
pub mod harvester;

pub use canonical::{CanonicalRow, DepthSnapshot, FeatureRow, Kind, RowPayload, Side, TradeRow};
pub use dq::{DqGate, DqReport, DqViolation};
pub use exchange::{ExchangeStream, MockExchangeStream, StreamError};
pub use harvester::{Harvester, HarvesterConfig, HarvesterError};
