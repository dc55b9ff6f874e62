#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! Rolling statistics primitives shared by feature compute: moving
//! averages and the rolling z-score behind the OFI/CVD fusion features.

pub mod indicators;
pub mod patterns;
pub mod zscore;

pub use indicators::{ExponentialMovingAverage, SimpleMovingAverage};
pub use zscore::RollingZScore;
