#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::useless_let_if_seq,
    clippy::missing_panics_doc,
    clippy::missing_safety_doc,
    clippy::missing_errors_doc
)]

//! Shared IO plumbing: dual JSONL+SQLite record sinks with atomic
//! spool-to-ready file rotation, config fingerprinting, adaptive rate
//! limiting and jittered reconnect backoff.

pub mod backoff;
pub mod channel;
pub mod digest;
pub mod error;
pub mod metric;
pub mod rate_limit;
pub mod rotation;
pub mod sink;

pub use backoff::JitteredBackoff;
pub use channel::{Channel, ChannelTxDroppable, Tx, Unrecoverable, UnboundedRx, UnboundedTx};
pub use digest::config_hash;
pub use error::IoError;
pub use metric::Metric;
pub use rate_limit::{Priority, RateLimiter};
pub use rotation::{RotationPolicy, RotationState};
pub use sink::dual::DualSink;
pub use sink::jsonl::JsonlSink;
pub use sink::sqlite::{SqlRecord, SqliteSink};
pub use sink::{ParityDiff, ParityTags, RecordSink, RollingCounters};
