//! Top-level engine configuration.

use crate::detection::{BreakConfig, MaskConfig};
use crate::error::{ForecastError, Result};
use crate::models::{CorrectionConfig, FitConfig};

/// Configuration for fitting entities.
///
/// # Example
/// ```
/// use anofox_growth::engine::EngineConfig;
///
/// let config = EngineConfig::default()
///     .with_interval_level(0.8)
///     .with_event_month("2021-01")
///     .unwrap();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    pub mask: MaskConfig,
    pub breaks: BreakConfig,
    pub fit: FitConfig,
    pub correction: CorrectionConfig,
    /// Entities whose last month is older than this many days before the
    /// newest month in the batch are inactive (default: 60).
    pub inactive_after_days: i64,
    /// Coverage of the forecast interval (default: 0.95).
    pub interval_level: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mask: MaskConfig::default(),
            breaks: BreakConfig::default(),
            fit: FitConfig::default(),
            correction: CorrectionConfig::default(),
            inactive_after_days: 60,
            interval_level: 0.95,
        }
    }
}

impl EngineConfig {
    pub fn with_mask(mut self, mask: MaskConfig) -> Self {
        self.mask = mask;
        self
    }

    pub fn with_breaks(mut self, breaks: BreakConfig) -> Self {
        self.breaks = breaks;
        self
    }

    pub fn with_fit(mut self, fit: FitConfig) -> Self {
        self.fit = fit;
        self
    }

    pub fn with_correction(mut self, correction: CorrectionConfig) -> Self {
        self.correction = correction;
        self
    }

    pub fn with_inactive_after_days(mut self, days: i64) -> Self {
        self.inactive_after_days = days;
        self
    }

    pub fn with_interval_level(mut self, level: f64) -> Self {
        self.interval_level = level;
        self
    }

    /// Move the fixed-date event to another month (`YYYY-MM`).
    pub fn with_event_month(mut self, month: &str) -> Result<Self> {
        self.breaks = self.breaks.with_event_month(month)?;
        Ok(self)
    }

    /// Check that every setting is usable.
    pub fn validate(&self) -> Result<()> {
        if !(self.interval_level > 0.0 && self.interval_level < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "interval_level must be in (0, 1), got {}",
                self.interval_level
            )));
        }
        if !(self.mask.iqr_multiplier.is_finite() && self.mask.iqr_multiplier >= 0.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "iqr_multiplier must be non-negative, got {}",
                self.mask.iqr_multiplier
            )));
        }
        if !(self.fit.min_k > 0.0 && self.fit.min_k < self.fit.max_k) {
            return Err(ForecastError::InvalidParameter(format!(
                "k bounds must satisfy 0 < min_k < max_k, got [{}, {}]",
                self.fit.min_k, self.fit.max_k
            )));
        }
        if !(0.0..1.0).contains(&self.fit.prior_k_band) {
            return Err(ForecastError::InvalidParameter(format!(
                "prior_k_band must be in [0, 1), got {}",
                self.fit.prior_k_band
            )));
        }
        if self.fit.min_valid == 0 || self.fit.tightened_max_valid < self.fit.min_valid {
            return Err(ForecastError::InvalidParameter(format!(
                "need 0 < min_valid <= tightened_max_valid, got {} and {}",
                self.fit.min_valid, self.fit.tightened_max_valid
            )));
        }
        if !(0.0..1.0).contains(&self.fit.restart_tolerance) {
            return Err(ForecastError::InvalidParameter(format!(
                "restart_tolerance must be in [0, 1), got {}",
                self.fit.restart_tolerance
            )));
        }
        if !(0.0..0.5).contains(&self.correction.trim) {
            return Err(ForecastError::InvalidParameter(format!(
                "trim must be in [0, 0.5), got {}",
                self.correction.trim
            )));
        }
        if self.inactive_after_days < 0 {
            return Err(ForecastError::InvalidParameter(format!(
                "inactive_after_days must be non-negative, got {}",
                self.inactive_after_days
            )));
        }
        Ok(())
    }
}
