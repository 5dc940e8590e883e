//! Detection utilities for monthly series.
//!
//! This module provides tools for detecting:
//! - Outliers (the validity mask every later stage is computed over)
//! - Structural breaks (sustained level shifts)

mod breaks;
mod outlier;

pub use breaks::{detect_breaks, is_usable, BreakAnalysis, BreakConfig, StructuralBreak};
pub use outlier::{build_mask, iqr_fences, IqrFences, MaskConfig, ValidityMask};
