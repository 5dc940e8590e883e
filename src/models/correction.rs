//! Residual decomposition and the short-horizon nudge.
//!
//! After the trend and seasonal factors are fitted, whatever is left over in
//! the most recent months is carried into the forecast as an additive
//! `nudge` that fades geometrically with `nudge_decay`.

use crate::core::{calendar_month, MonthlySeries};
use crate::seasonality::SeasonalProfile;
use crate::utils::stats::{autocorrelation, mean, trimmed_mean};

/// Additive correction applied to forecasts past the observed range.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResidualCorrection {
    pub nudge: f64,
    pub nudge_decay: f64,
}

impl Default for ResidualCorrection {
    fn default() -> Self {
        Self::none()
    }
}

impl ResidualCorrection {
    /// No correction.
    pub fn none() -> Self {
        Self {
            nudge: 0.0,
            nudge_decay: 0.0,
        }
    }

    /// Offset added at forecast step `h` (1 = first month after the data).
    pub fn offset(&self, h: usize) -> f64 {
        if self.nudge == 0.0 {
            return 0.0;
        }
        self.nudge * self.nudge_decay.powi(h as i32)
    }
}

/// Configuration for the nudge estimator.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CorrectionConfig {
    /// Months of recent residuals considered (default: 12).
    pub recent_window: usize,
    /// Fraction trimmed from each end for long histories (default: 0.2).
    pub trim: f64,
    /// Below this length the nudge is the last residual (default: 6).
    pub short_history: usize,
    /// From this length on the trimmed-mean rule applies (default: 12).
    pub long_history: usize,
    /// Residuals averaged for medium histories (default: 3).
    pub medium_window: usize,
    /// Upper clamp for the fitted decay (default: 0.9).
    pub max_decay: f64,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            recent_window: 12,
            trim: 0.2,
            short_history: 6,
            long_history: 12,
            medium_window: 3,
            max_decay: 0.9,
        }
    }
}

impl CorrectionConfig {
    pub fn with_trim(mut self, trim: f64) -> Self {
        self.trim = trim;
        self
    }

    pub fn with_max_decay(mut self, max_decay: f64) -> Self {
        self.max_decay = max_decay;
        self
    }
}

/// `actual − trend(t) · seasonal[month(t)]` for every month with a value.
///
/// Masked months are included; missing months are `NaN`.
pub fn compute_residuals<F>(series: &MonthlySeries, seasonal: &SeasonalProfile, trend: F) -> Vec<f64>
where
    F: Fn(usize) -> f64,
{
    series
        .values()
        .iter()
        .zip(series.dates())
        .enumerate()
        .map(|(i, (&actual, &date))| {
            if actual.is_finite() {
                actual - trend(i) * seasonal.factor(calendar_month(date))
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Estimate the nudge and its decay from the residual tail.
///
/// `values` are the raw observations the residuals were computed from; for
/// long histories only months with positive raw values contribute.
///
/// # Example
/// ```
/// use anofox_growth::models::{estimate_correction, CorrectionConfig};
///
/// let values = vec![100.0; 24];
/// let mut residuals = vec![0.0; 24];
/// for r in residuals.iter_mut().skip(21) {
///     *r = -30.0;
/// }
/// let correction = estimate_correction(&residuals, &values, &CorrectionConfig::default());
/// assert!(correction.nudge < 0.0);
/// assert_eq!(correction.nudge_decay, 1.0);
/// ```
pub fn estimate_correction(
    residuals: &[f64],
    values: &[f64],
    config: &CorrectionConfig,
) -> ResidualCorrection {
    let n = residuals.len();
    if n == 0 {
        return ResidualCorrection::none();
    }

    // The trim drops up to two residuals per end of a 12-month tail, so a
    // short dip only turns the nudge negative when it outweighs the rest of
    // the tail. Deep slumps are masked out of the fit and leave large
    // residuals that do.
    if n >= config.long_history {
        let from = n.saturating_sub(config.recent_window);
        let recent: Vec<f64> = (from..n)
            .filter(|&i| residuals[i].is_finite() && values.get(i).is_some_and(|&v| v > 0.0))
            .map(|i| residuals[i])
            .collect();
        if recent.is_empty() {
            return ResidualCorrection::none();
        }
        return ResidualCorrection {
            nudge: finite_or_zero(trimmed_mean(&recent, config.trim)),
            nudge_decay: 1.0,
        };
    }

    let finite: Vec<f64> = residuals.iter().copied().filter(|r| r.is_finite()).collect();
    let Some(&last) = finite.last() else {
        return ResidualCorrection::none();
    };

    let nudge = if n < config.short_history {
        last
    } else {
        let tail = &finite[finite.len().saturating_sub(config.medium_window)..];
        mean(tail)
    };

    let tail = &finite[finite.len().saturating_sub(config.recent_window)..];
    let decay = finite_or_zero(autocorrelation(tail, 1)).clamp(0.0, config.max_decay);

    ResidualCorrection {
        nudge: finite_or_zero(nudge),
        nudge_decay: decay,
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}
