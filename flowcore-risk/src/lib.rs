#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! Risk Module: schema validation, the ordered Risk Precheck pipeline,
//! position/drawdown/exposure/correlation tracking, and alert hooks
//! (§4.3, §9).

pub mod alert;
pub mod correlation;
pub mod drawdown;
pub mod exposure;
pub mod position_tracker;
pub mod precheck;
pub mod schema;
pub mod volatility;

pub use alert::{RiskAlertHook, RiskViolation, VecAlertHook};
pub use correlation::CorrelationMatrix;
pub use drawdown::DrawdownTracker;
pub use exposure::ExposureTracker;
pub use position_tracker::PositionTracker;
pub use precheck::{PrecheckConfig, PrecheckOutcome, RiskPrecheck};
pub use schema::SchemaValidator;
pub use volatility::VolatilityScaler;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("order rejected by risk precheck: {0}")]
    Rejected(flowcore_execution::RejectReason),
    #[error("order throttled by risk precheck, retry later")]
    Throttled,
}
