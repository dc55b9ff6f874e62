use thiserror::Error;

#[derive(Debug, Error)]
pub enum FusionError {
    #[error("fusion weights must sum to 1.0, got w_ofi={w_ofi} + w_cvd={w_cvd} = {sum}")]
    WeightsNotNormalized { w_ofi: f64, w_cvd: f64, sum: f64 },
}

/// Fusion weighting between the OFI and CVD z-scores (§4.1 "Fusion").
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct FusionWeights {
    pub w_ofi: f64,
    pub w_cvd: f64,
}

impl FusionWeights {
    const TOLERANCE: f64 = 1e-9;

    pub fn new(w_ofi: f64, w_cvd: f64) -> Result<Self, FusionError> {
        let sum = w_ofi + w_cvd;
        if (sum - 1.0).abs() > Self::TOLERANCE {
            return Err(FusionError::WeightsNotNormalized { w_ofi, w_cvd, sum });
        }
        Ok(Self { w_ofi, w_cvd })
    }
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self { w_ofi: 0.5, w_cvd: 0.5 }
    }
}

/// Result of fusing a pair of z-scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fusion {
    pub fusion_score: f64,
    pub consistency: f64,
}

/// Weighted-sum fusion of `z_ofi`/`z_cvd` plus a consistency score in
/// `[0, 1]` measuring how much the two series agree in magnitude and sign.
pub fn fuse(z_ofi: f64, z_cvd: f64, weights: FusionWeights) -> Fusion {
    let fusion_score = weights.w_ofi * z_ofi + weights.w_cvd * z_cvd;
    let consistency = consistency_score(z_ofi, z_cvd);
    Fusion { fusion_score, consistency }
}

fn consistency_score(z_ofi: f64, z_cvd: f64) -> f64 {
    if z_ofi.signum() != z_cvd.signum() && z_ofi != 0.0 && z_cvd != 0.0 {
        return 0.0;
    }
    let denom = z_ofi.abs() + z_cvd.abs();
    if denom == 0.0 {
        return 1.0;
    }
    1.0 - (z_ofi.abs() - z_cvd.abs()).abs() / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unnormalized_weights() {
        assert!(FusionWeights::new(0.6, 0.6).is_err());
    }

    #[test]
    fn accepts_normalized_weights() {
        assert!(FusionWeights::new(0.7, 0.3).is_ok());
    }

    #[test]
    fn agreeing_scores_have_high_consistency() {
        let fusion = fuse(2.0, 2.0, FusionWeights::default());
        assert_eq!(fusion.consistency, 1.0);
        assert_eq!(fusion.fusion_score, 2.0);
    }

    #[test]
    fn opposing_signs_have_zero_consistency() {
        let fusion = fuse(2.0, -2.0, FusionWeights::default());
        assert_eq!(fusion.consistency, 0.0);
        assert_eq!(fusion.fusion_score, 0.0);
    }

    #[test]
    fn differing_magnitudes_reduce_consistency() {
        let fusion = fuse(4.0, 1.0, FusionWeights::default());
        assert!(fusion.consistency > 0.0 && fusion.consistency < 1.0);
    }
}
