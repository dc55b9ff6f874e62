#![forbid(unsafe_code)]
#![warn(unused, clippy::cognitive_complexity, missing_debug_implementations, rust_2018_idioms)]

//! Ambient stack shared by the four worker binaries (`harvester`,
//! `signal-gen`, `strategy`, `orchestrator`): `tracing` logging
//! initialisation, `serde_json` config loading with digesting, and the
//! `--sink` CLI surface common to every worker (§6, §9).
//!
//! This crate intentionally carries no pipeline algorithm logic of its own
//! — every worker binary composes `flowcore-data`/`flowcore-signal`/
//! `flowcore-risk`/`flowcore-execution`/`flowcore-backtest`/
//! `flowcore-orchestrator` for that; this crate is pure CLI/process glue,
//! the §1 non-goal boundary between "core" and "external collaborators".

pub mod config;
pub mod feature_input;
pub mod logging;
pub mod output_sink;
pub mod sink_arg;

pub use config::load_config;
pub use feature_input::load_feature_rows;
pub use logging::init_logging;
pub use output_sink::OutputSink;
pub use sink_arg::SinkKind;
