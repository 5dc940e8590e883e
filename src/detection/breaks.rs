//! Structural-break detection over masked monthly series.
//!
//! Three scans run over the valid months only:
//!
//! - **Fixed-date**: the level change around a known calendar event
//!   (by default the March 2020 pandemic onset).
//! - **General**: the interior month with the largest relative jump between
//!   the mean of the preceding and following windows.
//! - **Secondary**: the general scan again, away from the fixed-date event
//!   and with a lower threshold, to pick up a second distinct break.
//!
//! # Example
//!
//! ```
//! use anofox_growth::core::MonthlySeries;
//! use anofox_growth::detection::{build_mask, detect_breaks, BreakConfig, MaskConfig};
//! use chrono::NaiveDate;
//!
//! let mut values = vec![100.0; 24];
//! values.extend(vec![150.0; 24]);
//! let series = MonthlySeries::builder("store")
//!     .monthly_from(NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(), 48)
//!     .values(values)
//!     .build()
//!     .unwrap();
//! let mask = build_mask(series.values(), &MaskConfig::default());
//!
//! let breaks = detect_breaks(&series, &mask, &BreakConfig::default());
//! assert_eq!(breaks.general.map(|b| b.index), Some(24));
//! ```

use super::outlier::ValidityMask;
use crate::core::MonthlySeries;
use crate::error::Result;
use chrono::NaiveDate;

/// A detected level change.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StructuralBreak {
    /// First month of the new level.
    pub index: usize,
    /// Post-break mean minus pre-break mean.
    pub shift: f64,
    /// `|shift| / max(pre, post, 1)`.
    pub ratio: f64,
}

/// Outcome of all break scans for one entity.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BreakAnalysis {
    /// Break at the configured calendar event.
    pub fixed: Option<StructuralBreak>,
    /// Largest general shift.
    pub general: Option<StructuralBreak>,
    /// Second shift, away from the fixed-date event.
    pub secondary: Option<StructuralBreak>,
    /// Break used for single-shift fitting (general wins over fixed).
    pub single: Option<StructuralBreak>,
    /// `(anchor, secondary)` breaks used for dual-shift fitting.
    pub dual: Option<(StructuralBreak, StructuralBreak)>,
}

impl BreakAnalysis {
    pub fn has_breaks(&self) -> bool {
        self.fixed.is_some() || self.general.is_some() || self.secondary.is_some()
    }
}

/// Configuration for break detection.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BreakConfig {
    /// Known event month for the fixed-date scan (default: 2020-03).
    pub event_month: Option<NaiveDate>,
    /// Valid months required on each side of the event (default: 5).
    pub event_min_side: usize,
    /// Valid months averaged on each side of the event (default: 3).
    pub event_window: usize,
    /// Months in each pre/post window of the general scan (default: 6).
    pub scan_window: usize,
    /// Months skipped at each end of the series (default: 6).
    pub scan_margin: usize,
    /// Valid months required inside each scan window (default: 3).
    pub scan_min_valid: usize,
    /// Minimum ratio for a general break (default: 0.15).
    pub threshold: f64,
    /// Minimum ratio for a secondary break (default: 0.12).
    pub secondary_threshold: f64,
    /// Months around the event excluded from the secondary scan (default: 12).
    pub secondary_exclusion: usize,
    /// Series length required for the secondary scan (default: 36).
    pub secondary_min_len: usize,
    /// Valid months on each side for a break to be fitted (default: 5).
    pub usable_min_side: usize,
}

impl Default for BreakConfig {
    fn default() -> Self {
        Self {
            event_month: NaiveDate::from_ymd_opt(2020, 3, 1),
            event_min_side: 5,
            event_window: 3,
            scan_window: 6,
            scan_margin: 6,
            scan_min_valid: 3,
            threshold: 0.15,
            secondary_threshold: 0.12,
            secondary_exclusion: 12,
            secondary_min_len: 36,
            usable_min_side: 5,
        }
    }
}

impl BreakConfig {
    /// Use a different known event month (`YYYY-MM`).
    pub fn with_event_month(mut self, month: &str) -> Result<Self> {
        self.event_month = Some(crate::core::parse_month(month)?);
        Ok(self)
    }

    /// Disable the fixed-date scan (and with it the secondary scan).
    pub fn without_event(mut self) -> Self {
        self.event_month = None;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }
}

/// Run all break scans for one entity.
pub fn detect_breaks(
    series: &MonthlySeries,
    mask: &ValidityMask,
    config: &BreakConfig,
) -> BreakAnalysis {
    let values = series.values();

    let fixed = config
        .event_month
        .and_then(|event| series.index_of(event))
        .and_then(|index| fixed_date_break(values, mask, index, config));

    let general = max_shift_scan(values, mask, config.threshold, None, config);

    let secondary = match fixed {
        Some(anchor) if values.len() >= config.secondary_min_len => max_shift_scan(
            values,
            mask,
            config.secondary_threshold,
            Some((anchor.index, config.secondary_exclusion)),
            config,
        ),
        _ => None,
    };

    let usable = |b: &StructuralBreak| is_usable(mask, b.index, config.usable_min_side);
    let single = general.filter(usable).or(fixed.filter(usable));

    let dual = match (fixed, secondary) {
        (Some(anchor), Some(second)) if anchor.index != second.index => Some((anchor, second)),
        _ => None,
    };

    BreakAnalysis {
        fixed,
        general,
        secondary,
        single,
        dual,
    }
}

/// Level change around a known event month.
fn fixed_date_break(
    values: &[f64],
    mask: &ValidityMask,
    index: usize,
    config: &BreakConfig,
) -> Option<StructuralBreak> {
    let before: Vec<f64> = (0..index)
        .filter(|&i| mask.is_valid(i))
        .map(|i| values[i])
        .collect();
    let after: Vec<f64> = (index..values.len())
        .filter(|&i| mask.is_valid(i))
        .map(|i| values[i])
        .collect();

    if before.len() < config.event_min_side || after.len() < config.event_min_side {
        return None;
    }

    let w = config.event_window.max(1);
    let pre = mean_of(&before[before.len().saturating_sub(w)..]);
    let post = mean_of(&after[..w.min(after.len())]);

    Some(StructuralBreak {
        index,
        shift: post - pre,
        ratio: shift_ratio(pre, post),
    })
}

/// Slide pre/post windows across interior months and keep the largest jump.
///
/// `exclude` is `(center, radius)`: months within `radius` of `center` are
/// skipped.
fn max_shift_scan(
    values: &[f64],
    mask: &ValidityMask,
    threshold: f64,
    exclude: Option<(usize, usize)>,
    config: &BreakConfig,
) -> Option<StructuralBreak> {
    let n = values.len();
    let window = config.scan_window;
    let margin = config.scan_margin.max(window);
    if n < 2 * margin + 1 {
        return None;
    }

    let mut best: Option<StructuralBreak> = None;

    for i in margin..n - margin {
        if let Some((center, radius)) = exclude {
            if i.abs_diff(center) <= radius {
                continue;
            }
        }

        let pre: Vec<f64> = (i - window..i)
            .filter(|&j| mask.is_valid(j))
            .map(|j| values[j])
            .collect();
        let post: Vec<f64> = (i..i + window)
            .filter(|&j| mask.is_valid(j))
            .map(|j| values[j])
            .collect();
        if pre.len() < config.scan_min_valid || post.len() < config.scan_min_valid {
            continue;
        }

        let pre_mean = mean_of(&pre);
        let post_mean = mean_of(&post);
        let ratio = shift_ratio(pre_mean, post_mean);

        if ratio > threshold && best.is_none_or(|b| ratio > b.ratio) {
            best = Some(StructuralBreak {
                index: i,
                shift: post_mean - pre_mean,
                ratio,
            });
        }
    }

    best
}

/// Whether a break has enough valid months on both sides to be fitted.
pub fn is_usable(mask: &ValidityMask, index: usize, min_side: usize) -> bool {
    let before = mask.valid_indices().filter(|&i| i < index).count();
    let after = mask.valid_count() - before;
    before >= min_side && after >= min_side
}

fn shift_ratio(pre: f64, post: f64) -> f64 {
    (post - pre).abs() / pre.max(post).max(1.0)
}

fn mean_of(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{build_mask, MaskConfig};
    use approx::assert_relative_eq;

    fn series_from(start: (i32, u32), values: Vec<f64>) -> MonthlySeries {
        let n = values.len();
        MonthlySeries::builder("test")
            .monthly_from(NaiveDate::from_ymd_opt(start.0, start.1, 1).unwrap(), n)
            .values(values)
            .build()
            .unwrap()
    }

    fn analyse(series: &MonthlySeries) -> BreakAnalysis {
        let mask = build_mask(series.values(), &MaskConfig::default().without_rescue());
        detect_breaks(series, &mask, &BreakConfig::default())
    }

    #[test]
    fn flat_series_has_no_breaks() {
        let series = series_from((2010, 1), vec![100.0; 48]);
        let breaks = analyse(&series);
        assert!(!breaks.has_breaks());
        assert!(breaks.single.is_none());
        assert!(breaks.dual.is_none());
    }

    #[test]
    fn general_scan_finds_step() {
        let mut values = vec![100.0; 30];
        values.extend(vec![130.0; 18]);
        let series = series_from((2010, 1), values);
        let breaks = analyse(&series);

        let general = breaks.general.unwrap();
        assert_eq!(general.index, 30);
        assert_relative_eq!(general.shift, 30.0, epsilon = 1e-10);
        assert_relative_eq!(general.ratio, 30.0 / 130.0, epsilon = 1e-10);
        assert_eq!(breaks.single, Some(general));
        assert!(breaks.fixed.is_none());
    }

    #[test]
    fn small_steps_are_ignored() {
        let mut values = vec![100.0; 24];
        values.extend(vec![110.0; 24]);
        let series = series_from((2010, 1), values);
        assert!(analyse(&series).general.is_none());
    }

    #[test]
    fn series_without_interior_months_has_no_general_break() {
        // 12 months leave nothing between the two 6-month margins.
        let mut values = vec![100.0; 6];
        values.extend(vec![200.0; 6]);
        let series = series_from((2010, 1), values);
        let breaks = analyse(&series);
        assert!(breaks.general.is_none());
        assert!(breaks.single.is_none());
    }

    #[test]
    fn fixed_date_break_measures_event_drop() {
        // 2018-01 .. 2021-12, pandemic drop at 2020-03 (index 26).
        let mut values = vec![100.0; 26];
        values.extend(vec![60.0; 22]);
        let series = series_from((2018, 1), values);
        let mask = build_mask(series.values(), &MaskConfig::default().without_rescue());
        let breaks = detect_breaks(&series, &mask, &BreakConfig::default());

        let fixed = breaks.fixed.unwrap();
        assert_eq!(fixed.index, 26);
        assert_relative_eq!(fixed.shift, -40.0, epsilon = 1e-10);
        // The general scan also lands on the event; it wins for single-shift fits.
        assert_eq!(breaks.single.map(|b| b.index), Some(26));
    }

    #[test]
    fn unusable_general_break_falls_back_to_event() {
        // 2018-01 .. 2020-12: a jump in the 8th month, then a 14% dip at
        // 2020-03 (index 26) that is too small for the general scan.
        let mut values = vec![100.0; 7];
        values.extend(vec![140.0; 19]);
        values.extend(vec![120.0; 10]);
        let series = series_from((2018, 1), values);
        let mask = build_mask(series.values(), &MaskConfig::default().without_rescue());
        let config = BreakConfig {
            usable_min_side: 8,
            ..BreakConfig::default()
        };
        let breaks = detect_breaks(&series, &mask, &config);

        assert_eq!(breaks.general.map(|b| b.index), Some(7));
        assert_eq!(breaks.fixed.map(|b| b.index), Some(26));
        assert_eq!(breaks.single, breaks.fixed);
    }

    #[test]
    fn fixed_date_requires_history_on_both_sides() {
        // Event is the 4th month: only 3 months before it.
        let series = series_from((2019, 12), vec![100.0; 20]);
        let breaks = analyse(&series);
        assert!(breaks.fixed.is_none());
    }

    #[test]
    fn event_outside_series_is_skipped() {
        let series = series_from((2010, 1), vec![100.0; 48]);
        let mask = build_mask(series.values(), &MaskConfig::default());
        let config = BreakConfig::default().with_event_month("2030-01").unwrap();
        assert!(detect_breaks(&series, &mask, &config).fixed.is_none());
    }

    #[test]
    fn secondary_scan_finds_distinct_break() {
        // 2016-01 .. 2021-12 (72 months): +40% in 2017-07 (index 18), then
        // a pandemic drop in 2020-03 (index 50).
        let mut values = vec![100.0; 18];
        values.extend(vec![140.0; 32]);
        values.extend(vec![90.0; 22]);
        let series = series_from((2016, 1), values);
        let breaks = analyse(&series);

        assert_eq!(breaks.fixed.map(|b| b.index), Some(50));
        let secondary = breaks.secondary.unwrap();
        assert_eq!(secondary.index, 18);
        let (anchor, second) = breaks.dual.unwrap();
        assert_eq!(anchor.index, 50);
        assert_eq!(second.index, 18);
    }

    #[test]
    fn secondary_scan_needs_long_series() {
        let mut values = vec![100.0; 8];
        values.extend(vec![140.0; 18]);
        values.extend(vec![90.0; 8]);
        // 2018-01 .. 2020-10: event at index 26, only 34 months.
        let series = series_from((2018, 1), values);
        let breaks = analyse(&series);
        assert!(breaks.fixed.is_some());
        assert!(breaks.secondary.is_none());
        assert!(breaks.dual.is_none());
    }

    #[test]
    fn usable_requires_valid_months_each_side() {
        let mask = build_mask(&[100.0; 12], &MaskConfig::default());
        assert!(is_usable(&mask, 6, 5));
        assert!(!is_usable(&mask, 3, 5));
        assert!(!is_usable(&mask, 10, 5));
    }
}
