//! Post-processing of raw solver weights.

/// Default cutoff below which a weight is dropped.
pub const DEFAULT_WEIGHT_CUTOFF: f64 = 1e-4;

/// Zero every weight with `|w| < cutoff` and renormalise the rest to sum to one.
///
/// If nothing survives the cutoff (or the survivors sum to zero) the result is
/// the all-zero allocation.
pub fn clean_weights(weights: &[f64], cutoff: f64) -> Vec<f64> {
    let kept: Vec<f64> = weights
        .iter()
        .map(|w| if w.abs() < cutoff { 0.0 } else { *w })
        .collect();
    let sum: f64 = kept.iter().sum();
    if sum.abs() <= f64::EPSILON {
        return vec![0.0; weights.len()];
    }
    kept.into_iter().map(|w| w / sum).collect()
}
