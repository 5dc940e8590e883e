//! Growth-curve models.
//!
//! - Curves: the logistic family and its evaluation ([`project`])
//! - Objective: masked MSE with constraint penalties ([`CurveObjective`])
//! - Selection: multi-start fitting and AIC model choice ([`select_model`])
//! - Correction: residual nudge and decay ([`ResidualCorrection`])

mod baseline;
mod correction;
mod curve;
mod objective;
mod selection;

pub use baseline::{estimate_base, BASE_CAP, BASE_POINTS};
pub use correction::{compute_residuals, estimate_correction, CorrectionConfig, ResidualCorrection};
pub use curve::{logistic, project, FitMode, FitParameters};
pub use objective::{Constraints, CurveObjective, PENALTY};
pub use selection::{aic, fit_startup, select_model, FitConfig, FitResult};
