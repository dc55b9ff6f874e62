pub mod cvd;
pub mod divergence;
pub mod fusion;
pub mod ofi;
pub mod scenario;

pub use cvd::{CvdCalculator, PropagationCap};
pub use divergence::{Divergence, DivergenceDetector};
pub use fusion::{fuse, Fusion, FusionError, FusionWeights};
pub use ofi::OfiCalculator;
pub use scenario::{classify as classify_scenario, ScenarioThresholds};
