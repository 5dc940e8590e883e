//! Masked mean-squared-error objective shared by every curve variant.

use super::curve::{project, FitMode, FitParameters};
use crate::detection::ValidityMask;

/// Objective value returned for infeasible parameter vectors.
pub const PENALTY: f64 = 1e15;

/// Feasible region for the optimized parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constraints {
    pub min_k: f64,
    pub max_k: f64,
    pub max_l: f64,
}

impl Constraints {
    /// `L` may reach ten times the observed headroom above `base`.
    pub fn new(min_k: f64, max_k: f64, base: f64, observed_max: f64) -> Self {
        Self {
            min_k,
            max_k,
            max_l: 10.0 * (observed_max - base).max(0.0),
        }
    }

    pub fn k_feasible(&self, k: f64) -> bool {
        k >= self.min_k && k <= self.max_k
    }

    pub fn l_feasible(&self, l: f64) -> bool {
        l >= 0.0 && l <= self.max_l
    }
}

/// Masked MSE of one curve variant against a series.
///
/// The free-parameter vector layout depends on the mode:
///
/// | mode        | vector                      |
/// |-------------|-----------------------------|
/// | standard    | `[L, k, t0]`                |
/// | shift       | `[L, k, t0, shift]`         |
/// | dual_shift  | `[L, k, t0, shift, shift2]` |
/// | startup     | `[L, t0]`                   |
///
/// `base` is always fixed, and so is `k` for startup fits.
#[derive(Debug, Clone)]
pub struct CurveObjective<'a> {
    values: &'a [f64],
    valid: Vec<usize>,
    mode: FitMode,
    base: f64,
    fixed_k: f64,
    break_index: Option<usize>,
    break_index2: Option<usize>,
    constraints: Constraints,
}

impl<'a> CurveObjective<'a> {
    pub fn new(
        values: &'a [f64],
        mask: &ValidityMask,
        mode: FitMode,
        base: f64,
        constraints: Constraints,
    ) -> Self {
        let valid = mask
            .valid_indices()
            .filter(|&i| values.get(i).is_some_and(|v| v.is_finite()))
            .collect();
        Self {
            values,
            valid,
            mode,
            base,
            fixed_k: 0.0,
            break_index: None,
            break_index2: None,
            constraints,
        }
    }

    /// Steepness used when the mode does not optimize `k`.
    pub fn with_fixed_k(mut self, k: f64) -> Self {
        self.fixed_k = k;
        self
    }

    pub fn with_breaks(mut self, break_index: Option<usize>, break_index2: Option<usize>) -> Self {
        self.break_index = break_index;
        self.break_index2 = break_index2;
        self
    }

    pub fn mode(&self) -> FitMode {
        self.mode
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Length of the underlying series, valid or not.
    pub fn series_len(&self) -> usize {
        self.values.len()
    }

    /// Number of months the objective averages over.
    pub fn valid_points(&self) -> usize {
        self.valid.len()
    }

    pub fn break_indices(&self) -> (Option<usize>, Option<usize>) {
        (self.break_index, self.break_index2)
    }

    /// Expand a free-parameter vector into full curve parameters.
    pub fn unpack(&self, free: &[f64]) -> FitParameters {
        let at = |i: usize| free.get(i).copied().unwrap_or(0.0);
        match self.mode {
            FitMode::Startup => FitParameters {
                base: self.base,
                l: at(0),
                k: self.fixed_k,
                t0: at(1),
                shift: None,
                shift2: None,
            },
            FitMode::Standard => FitParameters {
                base: self.base,
                l: at(0),
                k: at(1),
                t0: at(2),
                shift: None,
                shift2: None,
            },
            FitMode::Shift => FitParameters {
                base: self.base,
                l: at(0),
                k: at(1),
                t0: at(2),
                shift: Some(at(3)),
                shift2: None,
            },
            FitMode::DualShift => FitParameters {
                base: self.base,
                l: at(0),
                k: at(1),
                t0: at(2),
                shift: Some(at(3)),
                shift2: Some(at(4)),
            },
        }
    }

    /// Inverse of [`unpack`](Self::unpack).
    pub fn pack(&self, params: &FitParameters) -> Vec<f64> {
        match self.mode {
            FitMode::Startup => vec![params.l, params.t0],
            FitMode::Standard => vec![params.l, params.k, params.t0],
            FitMode::Shift => vec![
                params.l,
                params.k,
                params.t0,
                params.shift.unwrap_or(0.0),
            ],
            FitMode::DualShift => vec![
                params.l,
                params.k,
                params.t0,
                params.shift.unwrap_or(0.0),
                params.shift2.unwrap_or(0.0),
            ],
        }
    }

    /// Mean squared error over valid months, or [`PENALTY`] when infeasible.
    pub fn evaluate(&self, free: &[f64]) -> f64 {
        if self.valid.is_empty() || free.iter().any(|v| !v.is_finite()) {
            return PENALTY;
        }

        let params = self.unpack(free);
        if self.mode.optimizes_k() && !self.constraints.k_feasible(params.k) {
            return PENALTY;
        }
        if !self.constraints.l_feasible(params.l) {
            return PENALTY;
        }

        let sse: f64 = self
            .valid
            .iter()
            .map(|&i| {
                let predicted =
                    project(i as f64, &params, self.mode, self.break_index, self.break_index2);
                (self.values[i] - predicted).powi(2)
            })
            .sum();
        let mse = sse / self.valid.len() as f64;

        if mse.is_finite() {
            mse
        } else {
            PENALTY
        }
    }
}
