#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! Core identifiers and time-source primitives shared across every Flowcore
//! pipeline component: exchange/symbol identity, schema versioning and the
//! [`TimeProvider`] abstraction that keeps Backtest runs reproducible.

pub mod error;
pub mod exchange;
pub mod rng;
pub mod symbol;
pub mod time;

pub use error::InstrumentError;
pub use exchange::ExchangeId;
pub use symbol::{SchemaVersion, Symbol};
pub use time::TimeProvider;
