//! Descriptive statistics reported alongside each fitted entity.

use crate::detection::ValidityMask;
use crate::utils::stats::{correlation, safe_ratio};

/// Summary figures for one entity. Ratios are 0 when undefined.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DerivedStats {
    pub valid_months: usize,
    /// Sum of valid values.
    pub total: f64,
    /// Mean of valid values.
    pub mean: f64,
    /// Most recent observed value.
    pub last_value: f64,
    /// Largest valid value.
    pub peak_value: f64,
    /// Last 12 months against the 12 before them.
    pub yoy_growth: f64,
    /// Compound annual growth between the first and last 12-month totals.
    pub cagr: f64,
    /// Long-run level of the fitted curve.
    pub ceiling: f64,
    /// Latest trend value as a fraction of the ceiling.
    pub saturation: f64,
    /// Pearson correlation of fitted and actual over valid months.
    pub fit_correlation: f64,
}

const YEAR: usize = 12;

impl DerivedStats {
    /// Compute the figures from raw values, the mask and the in-sample fit.
    ///
    /// `latest_trend` is the trend at the last observed month.
    pub fn compute(
        values: &[f64],
        mask: &ValidityMask,
        fitted: &[f64],
        ceiling: f64,
        latest_trend: f64,
    ) -> Self {
        let valid: Vec<usize> = mask
            .valid_indices()
            .filter(|&i| values.get(i).is_some_and(|v| v.is_finite()))
            .collect();
        let valid_values: Vec<f64> = valid.iter().map(|&i| values[i]).collect();

        let total: f64 = valid_values.iter().sum();
        let last_value = values
            .iter()
            .rev()
            .copied()
            .find(|v| v.is_finite())
            .unwrap_or(0.0);
        let peak_value = valid_values.iter().copied().fold(0.0, f64::max);

        let fitted_valid: Vec<f64> = valid
            .iter()
            .filter_map(|&i| fitted.get(i).copied())
            .collect();

        Self {
            valid_months: valid.len(),
            total,
            mean: safe_ratio(total, valid.len() as f64),
            last_value,
            peak_value,
            yoy_growth: yoy_growth(values),
            cagr: cagr(values),
            ceiling,
            saturation: safe_ratio(latest_trend, ceiling),
            fit_correlation: correlation(&fitted_valid, &valid_values),
        }
    }
}

/// Sum of the finite values in `values[from..to]`.
fn window_total(values: &[f64], from: usize, to: usize) -> f64 {
    values[from..to].iter().filter(|v| v.is_finite()).sum()
}

fn yoy_growth(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 * YEAR {
        return 0.0;
    }
    let current = window_total(values, n - YEAR, n);
    let previous = window_total(values, n - 2 * YEAR, n - YEAR);
    safe_ratio(current - previous, previous)
}

/// Growth rate between the first and last full years of history.
fn cagr(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 * YEAR {
        return 0.0;
    }
    let first = window_total(values, 0, YEAR);
    let last = window_total(values, n - YEAR, n);
    if first <= 0.0 || last <= 0.0 {
        return 0.0;
    }
    let years = (n - YEAR) as f64 / YEAR as f64;
    let rate = (last / first).powf(1.0 / years) - 1.0;
    if rate.is_finite() {
        rate
    } else {
        0.0
    }
}
