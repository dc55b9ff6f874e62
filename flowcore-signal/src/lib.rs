#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! Signal Generator: a deterministic, fingerprinted decision engine that
//! turns each feature row into one `SignalRecord` (§4.2).

pub mod config;
pub mod dedupe;
pub mod engine;
pub mod record;

pub use config::{AlgoConfig, ScenarioOverride};
pub use dedupe::DedupeSet;
pub use engine::Decider;
pub use record::{DecisionCode, Regime, Side, SignalRecord, SignalType, Strength, SCHEMA_SIGNAL_RECORD};
