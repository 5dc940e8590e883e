//! Logistic growth curves with a movable baseline.
//!
//! All variants share one closed form,
//!
//! `y(t) = base + shift·[t ≥ b1] + shift2·[t ≥ b2] + L / (1 + e^(−k(t − t0)))`,
//!
//! and differ only in which terms are active and which parameters the
//! optimizer is allowed to move.

use std::fmt;

/// Which growth curve a fit uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FitMode {
    /// Logistic growth over a fixed base. Free: `L, k, t0`.
    Standard,
    /// One additive level shift. Free: `L, k, t0, shift`.
    Shift,
    /// Two additive level shifts. Free: `L, k, t0, shift, shift2`.
    DualShift,
    /// Short-history entity with `k` borrowed from peers. Free: `L, t0`.
    Startup,
}

impl FitMode {
    /// Number of parameters the optimizer moves (used as AIC's `k`).
    pub fn param_count(self) -> usize {
        match self {
            FitMode::Standard => 3,
            FitMode::Shift => 4,
            FitMode::DualShift => 5,
            FitMode::Startup => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FitMode::Standard => "standard",
            FitMode::Shift => "shift",
            FitMode::DualShift => "dual_shift",
            FitMode::Startup => "startup",
        }
    }

    /// Whether the steepness `k` is optimized rather than supplied.
    pub fn optimizes_k(self) -> bool {
        !matches!(self, FitMode::Startup)
    }
}

impl fmt::Display for FitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameters of a fitted growth curve.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FitParameters {
    /// Pre-growth intercept.
    pub base: f64,
    /// Incremental growth capacity above `base`.
    pub l: f64,
    /// Logistic steepness.
    pub k: f64,
    /// Inflection month index.
    pub t0: f64,
    /// Level change at the first break.
    pub shift: Option<f64>,
    /// Level change at the second break.
    pub shift2: Option<f64>,
}

impl FitParameters {
    /// All-zero parameters, used for entities that could not be fitted.
    pub fn zeros() -> Self {
        Self::default()
    }

    /// Long-run level: `base + L` plus any shifts.
    pub fn ceiling(&self) -> f64 {
        self.base + self.l + self.shift.unwrap_or(0.0) + self.shift2.unwrap_or(0.0)
    }
}

/// `L / (1 + e^(−k(t − t0)))`.
pub fn logistic(t: f64, l: f64, k: f64, t0: f64) -> f64 {
    let z = -k * (t - t0);
    // e^z overflows to inf for large z, which correctly sends the term to 0.
    l / (1.0 + z.exp())
}

/// Evaluate a growth curve at month `t`.
///
/// Used unchanged for in-sample reconstruction and for projecting months
/// past the end of the series.
///
/// # Example
/// ```
/// use anofox_growth::models::{project, FitMode, FitParameters};
///
/// let params = FitParameters { base: 100.0, l: 50.0, k: 0.3, t0: 12.0, shift: Some(20.0), shift2: None };
/// let before = project(5.0, &params, FitMode::Shift, Some(10), None);
/// let after = project(10.0, &params, FitMode::Shift, Some(10), None);
/// assert!(after - before > 20.0);
/// assert!((project(1e6, &params, FitMode::Shift, Some(10), None) - params.ceiling()).abs() < 1e-9);
/// ```
pub fn project(
    t: f64,
    params: &FitParameters,
    mode: FitMode,
    break_index: Option<usize>,
    break_index2: Option<usize>,
) -> f64 {
    let step = |shift: Option<f64>, index: Option<usize>| match (shift, index) {
        (Some(s), Some(b)) if t >= b as f64 => s,
        _ => 0.0,
    };

    let level = match mode {
        FitMode::Standard | FitMode::Startup => params.base,
        FitMode::Shift => params.base + step(params.shift, break_index),
        FitMode::DualShift => {
            params.base + step(params.shift, break_index) + step(params.shift2, break_index2)
        }
    };

    level + logistic(t, params.l, params.k, params.t0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params() -> FitParameters {
        FitParameters {
            base: 10.0,
            l: 100.0,
            k: 0.2,
            t0: 24.0,
            shift: Some(5.0),
            shift2: Some(-3.0),
        }
    }

    #[test]
    fn param_counts_match_free_parameters() {
        assert_eq!(FitMode::Standard.param_count(), 3);
        assert_eq!(FitMode::Shift.param_count(), 4);
        assert_eq!(FitMode::DualShift.param_count(), 5);
        assert_eq!(FitMode::Startup.param_count(), 2);
        assert!(!FitMode::Startup.optimizes_k());
        assert_eq!(FitMode::DualShift.to_string(), "dual_shift");
    }

    #[test]
    fn logistic_midpoint_is_half_capacity() {
        assert_relative_eq!(logistic(24.0, 100.0, 0.2, 24.0), 50.0, epsilon = 1e-12);
        assert_eq!(logistic(-1e6, 100.0, 0.2, 24.0), 0.0);
    }

    #[test]
    fn standard_ignores_shift_terms() {
        let p = params();
        let y = project(24.0, &p, FitMode::Standard, Some(0), Some(0));
        assert_relative_eq!(y, 60.0, epsilon = 1e-12);
    }

    #[test]
    fn shift_applies_from_break_onward() {
        let p = params();
        let before = project(9.0, &p, FitMode::Shift, Some(10), None);
        let at = project(10.0, &p, FitMode::Shift, Some(10), None);
        let expected_gap = 5.0 + logistic(10.0, 100.0, 0.2, 24.0) - logistic(9.0, 100.0, 0.2, 24.0);
        assert_relative_eq!(at - before, expected_gap, epsilon = 1e-12);
    }

    #[test]
    fn dual_shift_applies_both_steps() {
        let p = params();
        let y = project(30.0, &p, FitMode::DualShift, Some(10), Some(20));
        let expected = 10.0 + 5.0 - 3.0 + logistic(30.0, 100.0, 0.2, 24.0);
        assert_relative_eq!(y, expected, epsilon = 1e-12);

        // Second step not reached yet.
        let y = project(15.0, &p, FitMode::DualShift, Some(10), Some(20));
        let expected = 10.0 + 5.0 + logistic(15.0, 100.0, 0.2, 24.0);
        assert_relative_eq!(y, expected, epsilon = 1e-12);
    }

    #[test]
    fn ceiling_is_asymptote() {
        let p = params();
        let far = project(1e6, &p, FitMode::DualShift, Some(10), Some(20));
        assert_relative_eq!(far, p.ceiling(), epsilon = 1e-9);
        assert_relative_eq!(p.ceiling(), 112.0, epsilon = 1e-12);
    }
}
