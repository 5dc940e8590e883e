//! Baseline (pre-growth intercept) estimation.

use crate::detection::ValidityMask;

/// Number of leading valid months averaged into the base.
pub const BASE_POINTS: usize = 3;

/// Upper bound on the base as a fraction of the largest valid value.
pub const BASE_CAP: f64 = 0.8;

/// Estimate the fixed intercept of the growth curves.
///
/// Averages the first [`BASE_POINTS`] valid months (fewer if fewer exist),
/// capped at [`BASE_CAP`] of the largest valid value so the logistic term
/// always has room to grow. Returns 0 when no month is valid.
///
/// # Example
/// ```
/// use anofox_growth::detection::{build_mask, MaskConfig};
/// use anofox_growth::models::estimate_base;
///
/// let values = [10.0, 12.0, 14.0, 40.0, 60.0, 80.0];
/// let mask = build_mask(&values, &MaskConfig::default());
/// assert_eq!(estimate_base(&values, &mask), 12.0);
/// ```
pub fn estimate_base(values: &[f64], mask: &ValidityMask) -> f64 {
    let valid = mask.valid_values(values);
    if valid.is_empty() {
        return 0.0;
    }

    let head = &valid[..valid.len().min(BASE_POINTS)];
    let avg = head.iter().sum::<f64>() / head.len() as f64;
    let max = valid.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    avg.min(BASE_CAP * max)
}
