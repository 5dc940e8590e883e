//! Outlier masking for monthly series.
//!
//! A month is valid when its value is positive and inside the IQR fence of
//! the positive values. Recent months get a second chance: genuine growth
//! often breaks through fences computed from older, lower history, so a
//! value close to its own trailing average is kept.

use crate::utils::stats::{median, sorted};

/// Per-month validity flags, true iff the month is not an outlier.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValidityMask {
    flags: Vec<bool>,
}

impl ValidityMask {
    /// Number of months covered by the mask.
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn is_valid(&self, index: usize) -> bool {
        self.flags.get(index).copied().unwrap_or(false)
    }

    /// Number of valid months.
    pub fn valid_count(&self) -> usize {
        self.flags.iter().filter(|&&v| v).count()
    }

    /// Indices of valid months in ascending order.
    pub fn valid_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.flags
            .iter()
            .enumerate()
            .filter(|(_, &v)| v)
            .map(|(i, _)| i)
    }

    /// Values at valid months, in order.
    pub fn valid_values(&self, values: &[f64]) -> Vec<f64> {
        self.valid_indices()
            .filter_map(|i| values.get(i).copied())
            .collect()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.flags
    }
}

/// IQR fences used by the first masking pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrFences {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Configuration for outlier masking.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MaskConfig {
    /// IQR fence multiplier (default: 1.5).
    pub iqr_multiplier: f64,
    /// Number of most recent months eligible for rescue (default: 24).
    pub rescue_window: usize,
    /// Trailing window for the rescue average (default: 12).
    pub trailing_window: usize,
    /// Valid months required inside the trailing window (default: 6).
    pub min_trailing: usize,
    /// Relative distance from the trailing average that rescues a month (default: 0.11).
    pub rescue_tolerance: f64,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            iqr_multiplier: 1.5,
            rescue_window: 24,
            trailing_window: 12,
            min_trailing: 6,
            rescue_tolerance: 0.11,
        }
    }
}

impl MaskConfig {
    pub fn with_iqr_multiplier(mut self, multiplier: f64) -> Self {
        self.iqr_multiplier = multiplier;
        self
    }

    /// Disable the rescue pass.
    pub fn without_rescue(mut self) -> Self {
        self.rescue_window = 0;
        self
    }

    pub fn with_rescue_tolerance(mut self, tolerance: f64) -> Self {
        self.rescue_tolerance = tolerance;
        self
    }
}

/// Quartile fences over the strictly positive values.
///
/// Returns `None` when fewer than 4 positive values exist.
pub fn iqr_fences(values: &[f64], multiplier: f64) -> Option<IqrFences> {
    let positive: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v > 0.0)
        .collect();
    let n = positive.len();
    if n < 4 {
        return None;
    }

    let sorted = sorted(&positive);
    let q1 = sorted[n / 4];
    let q3 = sorted[3 * n / 4];
    let iqr = q3 - q1;

    Some(IqrFences {
        q1,
        median: median(&sorted),
        q3,
        lower: q1 - multiplier * iqr,
        upper: q3 + multiplier * iqr,
    })
}

/// Build the validity mask for a monthly series.
///
/// # Example
/// ```
/// use anofox_growth::detection::{build_mask, MaskConfig};
///
/// let mut values = vec![100.0; 30];
/// values[5] = 900.0;
/// let mask = build_mask(&values, &MaskConfig::default());
///
/// assert_eq!(mask.len(), 30);
/// assert!(!mask.is_valid(5));
/// assert_eq!(mask.valid_count(), 29);
/// ```
pub fn build_mask(values: &[f64], config: &MaskConfig) -> ValidityMask {
    let n = values.len();
    let Some(fences) = iqr_fences(values, config.iqr_multiplier) else {
        return ValidityMask {
            flags: vec![false; n],
        };
    };

    let mut flags: Vec<bool> = values
        .iter()
        .map(|&v| v.is_finite() && v > 0.0 && v >= fences.lower && v <= fences.upper)
        .collect();

    // Rescue pass, oldest first so rescued months feed later averages.
    let start = n.saturating_sub(config.rescue_window);
    for i in start..n {
        if flags[i] {
            continue;
        }
        let raw = values[i];
        if !(raw.is_finite() && raw > 0.0) {
            continue;
        }

        let from = i.saturating_sub(config.trailing_window);
        let trailing: Vec<f64> = (from..i).filter(|&j| flags[j]).map(|j| values[j]).collect();
        if trailing.len() < config.min_trailing.max(1) {
            continue;
        }

        let avg = trailing.iter().sum::<f64>() / trailing.len() as f64;
        if (raw - avg).abs() <= config.rescue_tolerance * avg {
            flags[i] = true;
        }
    }

    ValidityMask { flags }
}
