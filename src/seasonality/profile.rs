//! Calendar-month seasonal multipliers.

use crate::core::{calendar_month, MonthlySeries};
use crate::detection::ValidityMask;
use crate::utils::stats::median;

/// Trend values at or below this are too small to divide by.
pub const MIN_TREND: f64 = 1.0;

/// Twelve multiplicative seasonal factors, January first, with mean 1.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeasonalProfile {
    factors: [f64; 12],
}

impl Default for SeasonalProfile {
    fn default() -> Self {
        Self::flat()
    }
}

impl SeasonalProfile {
    /// No seasonality: every factor is 1.
    pub fn flat() -> Self {
        Self { factors: [1.0; 12] }
    }

    /// Build a profile from raw factors, rescaling them to mean 1.
    ///
    /// Falls back to [`flat`](Self::flat) when the factors cannot be
    /// normalized (non-finite or non-positive mean).
    pub fn normalized(factors: [f64; 12]) -> Self {
        let mean = factors.iter().sum::<f64>() / 12.0;
        if !mean.is_finite() || mean <= 0.0 {
            return Self::flat();
        }
        let mut scaled = factors;
        for f in &mut scaled {
            *f /= mean;
        }
        Self { factors: scaled }
    }

    /// Factor for calendar month `month` (0 = January).
    pub fn factor(&self, month: usize) -> f64 {
        self.factors[month % 12]
    }

    pub fn factors(&self) -> &[f64; 12] {
        &self.factors
    }

    pub fn mean(&self) -> f64 {
        self.factors.iter().sum::<f64>() / 12.0
    }

    /// Peak-to-trough spread of the factors.
    pub fn amplitude(&self) -> f64 {
        let max = self.factors.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = self.factors.iter().copied().fold(f64::INFINITY, f64::min);
        max - min
    }

    /// Element-wise median of several profiles, renormalized.
    ///
    /// Returns a flat profile when `profiles` is empty.
    pub fn median_of(profiles: &[SeasonalProfile]) -> Self {
        if profiles.is_empty() {
            return Self::flat();
        }
        let mut factors = [1.0; 12];
        for (month, slot) in factors.iter_mut().enumerate() {
            let column: Vec<f64> = profiles.iter().map(|p| p.factors[month]).collect();
            *slot = median(&column);
        }
        Self::normalized(factors)
    }
}

/// Extract seasonal factors from an entity's own history.
///
/// For every valid month with `trend(t) > MIN_TREND`, the ratio
/// `actual / trend` is bucketed by calendar month; each bucket's median is
/// its factor (1 for empty buckets), and the twelve factors are then scaled
/// to mean 1.
///
/// # Example
/// ```
/// use anofox_growth::core::MonthlySeries;
/// use anofox_growth::detection::{build_mask, MaskConfig};
/// use anofox_growth::seasonality::extract_seasonality;
/// use chrono::NaiveDate;
///
/// // December is 20% above a flat trend of 100.
/// let values: Vec<f64> = (0..36).map(|i| if i % 12 == 11 { 120.0 } else { 100.0 }).collect();
/// let series = MonthlySeries::builder("s")
///     .monthly_from(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), 36)
///     .values(values)
///     .build()
///     .unwrap();
/// let mask = build_mask(series.values(), &MaskConfig::default().with_iqr_multiplier(100.0));
///
/// let profile = extract_seasonality(&series, &mask, |_| 100.0);
/// assert!((profile.mean() - 1.0).abs() < 1e-12);
/// assert!(profile.factor(11) > profile.factor(0));
/// ```
pub fn extract_seasonality<F>(series: &MonthlySeries, mask: &ValidityMask, trend: F) -> SeasonalProfile
where
    F: Fn(usize) -> f64,
{
    let values = series.values();
    let dates = series.dates();
    let mut buckets: [Vec<f64>; 12] = Default::default();

    for i in mask.valid_indices() {
        let actual = values[i];
        let level = trend(i);
        if !actual.is_finite() || !level.is_finite() || level <= MIN_TREND {
            continue;
        }
        buckets[calendar_month(dates[i])].push(actual / level);
    }

    let mut factors = [1.0; 12];
    for (slot, bucket) in factors.iter_mut().zip(buckets.iter()) {
        if !bucket.is_empty() {
            *slot = median(bucket);
        }
    }

    SeasonalProfile::normalized(factors)
}
