//! Candidate fitting and AIC-based model selection.
//!
//! Every entity gets a `standard` fit. A usable single break adds a `shift`
//! candidate, and a fixed-date break paired with a distinct secondary break
//! adds a `dual_shift` candidate. The lowest AIC wins; on ties the simpler
//! model is kept. Short-history entities skip selection and get a `startup`
//! fit whose steepness is borrowed from peers.
//!
//! The shift candidates nest `standard` (a zero shift reproduces it), so they
//! are also started from the `standard` optimum, and every candidate is
//! restarted until its objective stops improving. Without that, the simplex
//! stopping rule leaves nested fits at unrelated points and the AIC compares
//! convergence noise instead of fit quality.

use super::curve::{project, FitMode, FitParameters};
use super::objective::{Constraints, CurveObjective, PENALTY};
use crate::detection::{BreakAnalysis, ValidityMask};
use crate::utils::optimization::{nelder_mead, NelderMeadConfig};

/// Floor for `SSE / n` inside the AIC so perfect fits stay finite.
const MIN_MSE: f64 = 1e-10;

/// Configuration for curve fitting.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FitConfig {
    /// Simplex optimizer settings.
    pub optimizer: NelderMeadConfig,
    /// Lower bound on `k` (default: 1e-4).
    pub min_k: f64,
    /// Upper bound on `k` (default: 5.0).
    pub max_k: f64,
    /// Starting `k` when no peer median is known (default: 0.1).
    pub initial_k: f64,
    /// Relative band around the peer median `k` for short histories (default: 0.5).
    pub prior_k_band: f64,
    /// Valid months needed for a full fit (default: 12).
    pub min_valid: usize,
    /// Largest valid-month count that still gets the tightened band (default: 35).
    pub tightened_max_valid: usize,
    /// `t0` starting points as fractions of the series length.
    pub t0_seeds: Vec<f64>,
    /// `t0` starting points for startup fits, as fractions of the series length.
    pub startup_t0_seeds: Vec<f64>,
    /// Simplex restarts from the best point found so far (default: 10).
    pub max_restarts: usize,
    /// Relative improvement below which restarts stop (default: 1e-6).
    ///
    /// Also scales the simplex tolerance of each restart to the current
    /// objective, so near-perfect fits keep converging.
    pub restart_tolerance: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            optimizer: NelderMeadConfig::default(),
            min_k: 1e-4,
            max_k: 5.0,
            initial_k: 0.1,
            prior_k_band: 0.5,
            min_valid: 12,
            tightened_max_valid: 35,
            t0_seeds: vec![0.25, 0.5, 0.75],
            startup_t0_seeds: vec![0.5, 1.0, 1.5],
            max_restarts: 10,
            restart_tolerance: 1e-6,
        }
    }
}

impl FitConfig {
    pub fn with_optimizer(mut self, optimizer: NelderMeadConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_k_bounds(mut self, min_k: f64, max_k: f64) -> Self {
        self.min_k = min_k;
        self.max_k = max_k;
        self
    }

    pub fn with_restarts(mut self, max_restarts: usize, restart_tolerance: f64) -> Self {
        self.max_restarts = max_restarts;
        self.restart_tolerance = restart_tolerance;
        self
    }

    /// Bounds on `k` for an entity with `valid` months.
    ///
    /// Entities with `min_valid..=tightened_max_valid` months are held to
    /// `prior_k · (1 ± prior_k_band)` when a peer median is available.
    pub fn k_bounds(&self, valid: usize, prior_k: Option<f64>) -> (f64, f64) {
        match prior_k {
            Some(k)
                if k.is_finite()
                    && k > 0.0
                    && valid >= self.min_valid
                    && valid <= self.tightened_max_valid =>
            {
                (k * (1.0 - self.prior_k_band), k * (1.0 + self.prior_k_band))
            }
            _ => (self.min_k, self.max_k),
        }
    }
}

/// The winning curve for an entity and its diagnostics.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FitResult {
    pub mode: FitMode,
    pub params: FitParameters,
    pub break_index: Option<usize>,
    pub break_index2: Option<usize>,
    /// Sum of squared errors over valid months.
    pub sse: f64,
    pub aic: f64,
    /// Number of valid months the fit used.
    pub valid_points: usize,
}

impl FitResult {
    /// Placeholder for an entity that could not be fitted.
    pub fn insufficient(valid_points: usize) -> Self {
        Self {
            mode: FitMode::Startup,
            params: FitParameters::zeros(),
            break_index: None,
            break_index2: None,
            sse: 0.0,
            aic: 0.0,
            valid_points,
        }
    }

    /// Trend value at month `t`.
    pub fn trend(&self, t: f64) -> f64 {
        project(t, &self.params, self.mode, self.break_index, self.break_index2)
    }
}

/// Akaike Information Criterion, `n·ln(SSE/n) + 2k`.
pub fn aic(sse: f64, n: usize, k: usize) -> f64 {
    if n == 0 {
        return f64::INFINITY;
    }
    let mse = (sse / n as f64).max(MIN_MSE);
    n as f64 * mse.ln() + 2.0 * k as f64
}

/// Fit every applicable candidate and return the one with the lowest AIC.
///
/// `prior_k` is the peer median steepness; it seeds `k` and, for histories of
/// `min_valid..=tightened_max_valid` months, tightens its bounds.
pub fn select_model(
    values: &[f64],
    mask: &ValidityMask,
    base: f64,
    breaks: &BreakAnalysis,
    prior_k: Option<f64>,
    config: &FitConfig,
) -> FitResult {
    let valid = mask.valid_count();
    let (min_k, max_k) = config.k_bounds(valid, prior_k);
    let constraints = Constraints::new(min_k, max_k, base, observed_max(values, mask));
    let k0 = prior_k
        .filter(|k| k.is_finite())
        .unwrap_or(config.initial_k)
        .clamp(min_k, max_k);

    let standard = fit_curve(
        CurveObjective::new(values, mask, FitMode::Standard, base, constraints),
        k0,
        None,
        &config.t0_seeds,
        None,
        config,
    );
    let mut best = standard.clone();

    if let Some(b) = breaks.single {
        let candidate = fit_curve(
            CurveObjective::new(values, mask, FitMode::Shift, base, constraints)
                .with_breaks(Some(b.index), None),
            k0,
            Some((b.shift, 0.0)),
            &config.t0_seeds,
            Some(&standard.params),
            config,
        );
        if candidate.aic < best.aic {
            best = candidate;
        }
    }

    if let Some((anchor, second)) = breaks.dual {
        let candidate = fit_curve(
            CurveObjective::new(values, mask, FitMode::DualShift, base, constraints)
                .with_breaks(Some(anchor.index), Some(second.index)),
            k0,
            Some((anchor.shift, second.shift)),
            &config.t0_seeds,
            Some(&standard.params),
            config,
        );
        if candidate.aic < best.aic {
            best = candidate;
        }
    }

    best
}

/// Fit the startup curve with `k` fixed to the supplied peer value.
pub fn fit_startup(
    values: &[f64],
    mask: &ValidityMask,
    base: f64,
    k: f64,
    config: &FitConfig,
) -> FitResult {
    let constraints = Constraints::new(
        config.min_k,
        config.max_k,
        base,
        observed_max(values, mask),
    );
    fit_curve(
        CurveObjective::new(values, mask, FitMode::Startup, base, constraints).with_fixed_k(k),
        k,
        None,
        &config.startup_t0_seeds,
        None,
        config,
    )
}

/// Multi-start Nelder-Mead over one curve variant, polished by restarts.
///
/// `warm` is a fitted curve of a nested variant; its parameters (with any
/// missing shift at zero) are tried as one more start.
fn fit_curve(
    objective: CurveObjective<'_>,
    k0: f64,
    shifts: Option<(f64, f64)>,
    t0_seeds: &[f64],
    warm: Option<&FitParameters>,
    config: &FitConfig,
) -> FitResult {
    let n = objective.valid_points();
    let len = objective.series_len();
    let headroom = objective.constraints().max_l / 10.0;
    let (shift, shift2) = shifts.unwrap_or((0.0, 0.0));

    // Shifts already explain part of the rise, so start L on what is left.
    let l0 = (headroom - shift.max(0.0) - shift2.max(0.0)).max(headroom * 0.5);

    let seeds: Vec<f64> = if t0_seeds.is_empty() {
        vec![0.5]
    } else {
        t0_seeds.to_vec()
    };

    let mut starts: Vec<Vec<f64>> = seeds
        .into_iter()
        .map(|fraction| {
            objective.pack(&FitParameters {
                base: 0.0,
                l: l0,
                k: k0,
                t0: fraction * len as f64,
                shift: Some(shift),
                shift2: Some(shift2),
            })
        })
        .collect();
    if let Some(params) = warm {
        starts.push(objective.pack(params));
    }

    let mut best_point: Option<Vec<f64>> = None;
    let mut best_value = f64::INFINITY;

    for initial in &starts {
        let result = nelder_mead(|p| objective.evaluate(p), initial, &config.optimizer);
        if result.optimal_value < best_value || best_point.is_none() {
            best_value = result.optimal_value;
            best_point = Some(result.optimal_point);
        }
    }

    let (point, best_value) = match best_point {
        Some(point) => polish(&objective, point, best_value, config),
        None => (Vec::new(), best_value),
    };
    let params = objective.unpack(&point);
    let mode = objective.mode();
    let (break_index, break_index2) = objective.break_indices();

    let mse = if best_value.is_finite() { best_value } else { PENALTY };
    let sse = mse * n as f64;

    FitResult {
        mode,
        params,
        break_index,
        break_index2,
        sse,
        aic: aic(sse, n, mode.param_count()),
        valid_points: n,
    }
}

/// Restart the simplex from `point` until the objective stops improving.
///
/// Each restart builds a fresh simplex around the best point and stops at a
/// spread relative to the current value. Polishing ends once the value is
/// below the AIC floor, where further gains cannot change the selection.
fn polish(
    objective: &CurveObjective<'_>,
    mut point: Vec<f64>,
    mut value: f64,
    config: &FitConfig,
) -> (Vec<f64>, f64) {
    for _ in 0..config.max_restarts {
        if !value.is_finite() || value >= PENALTY || value <= MIN_MSE {
            break;
        }
        let optimizer = config
            .optimizer
            .clone()
            .with_tolerance(value * config.restart_tolerance);
        let result = nelder_mead(|p| objective.evaluate(p), &point, &optimizer);
        if result.optimal_value >= value {
            break;
        }
        let stalled = value - result.optimal_value <= value * config.restart_tolerance;
        point = result.optimal_point;
        value = result.optimal_value;
        if stalled {
            break;
        }
    }
    (point, value)
}

/// Largest value among valid months (0 if none).
fn observed_max(values: &[f64], mask: &ValidityMask) -> f64 {
    mask.valid_values(values)
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(0.0, f64::max)
}
