//! Fitting one entity end to end.

use super::config::EngineConfig;
use super::stats::DerivedStats;
use super::summary::GlobalSummary;
use crate::core::{add_months, calendar_month, days_between, Forecast, MonthlySeries};
use crate::detection::{build_mask, detect_breaks, BreakAnalysis, ValidityMask};
use crate::error::{ForecastError, Result};
use crate::models::{
    compute_residuals, estimate_base, estimate_correction, fit_startup, select_model, FitResult,
    ResidualCorrection,
};
use crate::seasonality::{extract_seasonality, SeasonalProfile};
use crate::utils::quantile_normal;
use crate::utils::stats::std_dev;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// How an entity's model was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EntityStatus {
    /// Enough valid history for full model selection.
    Fitted,
    /// Short history, fitted with peer `k` and seasonality.
    Startup,
    /// Too little data and no peers to borrow from.
    InsufficientData,
}

/// Everything known about one fitted entity.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityModel {
    pub series: MonthlySeries,
    pub mask: ValidityMask,
    /// Whether the entity still reports data.
    pub is_active: bool,
    pub status: EntityStatus,
    pub fit: FitResult,
    pub seasonal: SeasonalProfile,
    pub correction: ResidualCorrection,
    /// Sample standard deviation of residuals over valid months.
    pub std_dev: f64,
    pub derived_stats: DerivedStats,
    pub breaks: BreakAnalysis,
    /// Interval coverage used by [`forecast`](Self::forecast).
    pub interval_level: f64,
}

impl EntityModel {
    pub fn name(&self) -> &str {
        self.series.name()
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        self.series.metadata()
    }

    /// Whether [`forecast`](Self::forecast) can produce values.
    pub fn is_forecastable(&self) -> bool {
        self.status != EntityStatus::InsufficientData
    }

    /// Trend (curve without seasonality) at month index `t`.
    pub fn trend(&self, t: f64) -> f64 {
        self.fit.trend(t)
    }

    /// In-sample reconstruction, `trend · seasonal`, without the nudge.
    pub fn fitted(&self) -> Vec<f64> {
        self.series
            .dates()
            .iter()
            .enumerate()
            .map(|(i, &date)| self.trend(i as f64) * self.seasonal.factor(calendar_month(date)))
            .collect()
    }

    /// `actual − fitted` for every observed month, `NaN` where missing.
    pub fn residuals(&self) -> Vec<f64> {
        compute_residuals(&self.series, &self.seasonal, |i| self.trend(i as f64))
    }

    /// Project `horizon` months past the last observation.
    ///
    /// Each step is `trend · seasonal + nudge · decay^h`, floored at zero,
    /// with a symmetric normal interval of the residual standard deviation.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::InsufficientData`] for entities that could
    /// not be fitted.
    pub fn forecast(&self, horizon: usize) -> Result<Forecast> {
        if !self.is_forecastable() {
            return Err(ForecastError::InsufficientData {
                needed: 1,
                got: self.fit.valid_points,
            });
        }

        let n = self.series.len();
        let last = self.series.last_date();
        let z = quantile_normal(0.5 + self.interval_level / 2.0);
        let margin = if z.is_finite() { z * self.std_dev } else { 0.0 };

        let mut dates = Vec::with_capacity(horizon);
        let mut point = Vec::with_capacity(horizon);
        let mut lower = Vec::with_capacity(horizon);
        let mut upper = Vec::with_capacity(horizon);

        for h in 1..=horizon {
            let date = add_months(last, h as i64);
            let t = (n - 1 + h) as f64;
            let raw = self.trend(t) * self.seasonal.factor(calendar_month(date))
                + self.correction.offset(h);
            let value = raw.max(0.0);

            dates.push(date);
            point.push(value);
            lower.push((value - margin).max(0.0));
            upper.push(value + margin);
        }

        Forecast::from_values_with_intervals(dates, point, lower, upper)
    }
}

/// Fit a single entity.
///
/// `global_max_date` is the newest month across the whole batch and decides
/// [`EntityModel::is_active`]. `summary` supplies peer priors: its median `k`
/// tightens bounds for entities with a short but fittable history, and
/// entities below `config.fit.min_valid` valid months are fitted as
/// [`EntityStatus::Startup`] from it. Without a summary those entities come
/// back as [`EntityStatus::InsufficientData`].
///
/// # Errors
///
/// Only an invalid `config` is an error; degenerate data never is.
///
/// # Example
/// ```
/// use anofox_growth::core::MonthlySeries;
/// use anofox_growth::engine::{fit_entity, EngineConfig, EntityStatus};
/// use chrono::NaiveDate;
///
/// let values: Vec<f64> = (0..48)
///     .map(|t| 100.0 + 80.0 / (1.0 + (-0.15 * (t as f64 - 24.0)).exp()))
///     .collect();
/// let series = MonthlySeries::builder("store-1")
///     .monthly_from(NaiveDate::from_ymd_opt(2012, 1, 1).unwrap(), 48)
///     .values(values)
///     .build()
///     .unwrap();
/// let latest = series.last_date();
///
/// let model = fit_entity(series, latest, None, &EngineConfig::default()).unwrap();
/// assert_eq!(model.status, EntityStatus::Fitted);
/// assert_eq!(model.forecast(6).unwrap().horizon(), 6);
/// ```
pub fn fit_entity(
    series: MonthlySeries,
    global_max_date: NaiveDate,
    summary: Option<&GlobalSummary>,
    config: &EngineConfig,
) -> Result<EntityModel> {
    config.validate()?;
    Ok(fit_validated(series, global_max_date, summary, config))
}

/// [`fit_entity`] for an already validated configuration.
pub(crate) fn fit_validated(
    series: MonthlySeries,
    global_max_date: NaiveDate,
    summary: Option<&GlobalSummary>,
    config: &EngineConfig,
) -> EntityModel {
    let values = series.values();
    let mask = build_mask(values, &config.mask);
    let valid = mask.valid_count();
    let base = estimate_base(values, &mask);
    let is_active = days_between(series.last_date(), global_max_date) <= config.inactive_after_days;
    let prior_k = summary.map(|s| s.median_k).filter(|k| k.is_finite() && *k > 0.0);

    let (status, fit, seasonal, breaks) = if valid >= config.fit.min_valid {
        let breaks = detect_breaks(&series, &mask, &config.breaks);
        let fit = select_model(values, &mask, base, &breaks, prior_k, &config.fit);
        let seasonal = extract_seasonality(&series, &mask, |i| fit.trend(i as f64));
        debug!(
            entity = %series.name(),
            mode = ?fit.mode,
            aic = fit.aic,
            valid,
            fixed = ?breaks.fixed.map(|b| b.index),
            general = ?breaks.general.map(|b| b.index),
            "selected growth model"
        );
        (EntityStatus::Fitted, fit, seasonal, breaks)
    } else if let (Some(k), Some(summary), true) = (prior_k, summary, valid > 0) {
        let fit = fit_startup(values, &mask, base, k, &config.fit);
        debug!(entity = %series.name(), k, valid, "fitted startup model");
        (
            EntityStatus::Startup,
            fit,
            summary.median_seasonality,
            BreakAnalysis::default(),
        )
    } else {
        warn!(
            entity = %series.name(),
            valid,
            needed = config.fit.min_valid,
            "insufficient data, entity left unfitted"
        );
        (
            EntityStatus::InsufficientData,
            FitResult::insufficient(valid),
            SeasonalProfile::flat(),
            BreakAnalysis::default(),
        )
    };

    let (correction, residual_sd) = if status == EntityStatus::InsufficientData {
        (ResidualCorrection::none(), 0.0)
    } else {
        let residuals = compute_residuals(&series, &seasonal, |i| fit.trend(i as f64));
        let correction = estimate_correction(&residuals, values, &config.correction);
        let valid_residuals: Vec<f64> = mask
            .valid_indices()
            .map(|i| residuals[i])
            .filter(|r| r.is_finite())
            .collect();
        let sd = if valid_residuals.len() < 2 {
            0.0
        } else {
            std_dev(&valid_residuals)
        };
        (correction, sd)
    };

    let fitted: Vec<f64> = series
        .dates()
        .iter()
        .enumerate()
        .map(|(i, &date)| fit.trend(i as f64) * seasonal.factor(calendar_month(date)))
        .collect();
    let latest_trend = if series.is_empty() {
        0.0
    } else {
        fit.trend((series.len() - 1) as f64)
    };
    let derived_stats =
        DerivedStats::compute(values, &mask, &fitted, fit.params.ceiling(), latest_trend);

    EntityModel {
        series,
        mask,
        is_active,
        status,
        fit,
        seasonal,
        correction,
        std_dev: residual_sd,
        derived_stats,
        breaks,
        interval_level: config.interval_level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{logistic, FitMode};
    use approx::assert_relative_eq;

    fn monthly(name: &str, start: (i32, u32), values: Vec<f64>) -> MonthlySeries {
        let n = values.len();
        MonthlySeries::builder(name)
            .monthly_from(NaiveDate::from_ymd_opt(start.0, start.1, 1).unwrap(), n)
            .values(values)
            .build()
            .unwrap()
    }

    fn growth(n: usize) -> Vec<f64> {
        (0..n)
            .map(|t| 100.0 + logistic(t as f64, 60.0, 0.12, n as f64 / 2.0))
            .collect()
    }

    #[test]
    fn long_history_is_fitted() {
        let series = monthly("a", (2010, 1), growth(48));
        let latest = series.last_date();
        let model = fit_entity(series, latest, None, &EngineConfig::default()).unwrap();

        assert_eq!(model.status, EntityStatus::Fitted);
        assert_eq!(model.fit.mode, FitMode::Standard);
        assert_eq!(model.mask.len(), 48);
        assert!(model.is_active);
        assert_relative_eq!(model.seasonal.mean(), 1.0, epsilon = 1e-6);
        assert!(model.derived_stats.fit_correlation > 0.95);
    }

    #[test]
    fn short_history_without_summary_is_insufficient() {
        let series = monthly("b", (2023, 1), vec![10.0, 12.0, 14.0, 16.0, 18.0]);
        let latest = series.last_date();
        let model = fit_entity(series, latest, None, &EngineConfig::default()).unwrap();

        assert_eq!(model.status, EntityStatus::InsufficientData);
        assert_eq!(model.fit.params.l, 0.0);
        assert_eq!(model.seasonal, SeasonalProfile::flat());
        assert_eq!(model.correction, ResidualCorrection::none());
        assert_eq!(model.std_dev, 0.0);
        assert!(matches!(
            model.forecast(3),
            Err(ForecastError::InsufficientData { .. })
        ));
    }

    #[test]
    fn short_history_borrows_from_summary() {
        let mut factors = [1.0; 12];
        factors[5] = 1.3;
        let summary = GlobalSummary::new(0.12, SeasonalProfile::normalized(factors), 10);

        let series = monthly("c", (2023, 1), vec![10.0, 12.0, 14.0, 16.0, 18.0, 20.0]);
        let latest = series.last_date();
        let model = fit_entity(series, latest, Some(&summary), &EngineConfig::default()).unwrap();

        assert_eq!(model.status, EntityStatus::Startup);
        assert_eq!(model.fit.mode, FitMode::Startup);
        assert_eq!(model.fit.params.k, 0.12);
        assert_eq!(model.seasonal, summary.median_seasonality);
    }

    #[test]
    fn stale_entity_is_inactive() {
        let series = monthly("d", (2010, 1), growth(24));
        let global_max = NaiveDate::from_ymd_opt(2012, 6, 1).unwrap();
        let model = fit_entity(series, global_max, None, &EngineConfig::default()).unwrap();
        // Last month is 2011-12, more than 60 days before 2012-06.
        assert!(!model.is_active);
    }

    #[test]
    fn recent_entity_within_window_is_active() {
        let series = monthly("e", (2010, 1), growth(24));
        // 2011-12 to 2012-01 is 31 days.
        let global_max = NaiveDate::from_ymd_opt(2012, 1, 1).unwrap();
        let model = fit_entity(series, global_max, None, &EngineConfig::default()).unwrap();
        assert!(model.is_active);
    }

    #[test]
    fn forecast_continues_dates_and_stays_non_negative() {
        let series = monthly("f", (2015, 3), growth(36));
        let latest = series.last_date();
        let model = fit_entity(series, latest, None, &EngineConfig::default()).unwrap();
        let forecast = model.forecast(12).unwrap();

        assert_eq!(forecast.horizon(), 12);
        assert_eq!(forecast.dates()[0], NaiveDate::from_ymd_opt(2018, 3, 1).unwrap());
        assert!(forecast.point().iter().all(|&v| v >= 0.0));
        let lower = forecast.lower().unwrap();
        let upper = forecast.upper().unwrap();
        for i in 0..12 {
            assert!(lower[i] <= forecast.point()[i]);
            assert!(upper[i] >= forecast.point()[i]);
        }
        assert!(model.forecast(0).unwrap().is_empty());
    }

    #[test]
    fn invalid_config_is_an_error() {
        let series = monthly("g", (2010, 1), growth(24));
        let latest = series.last_date();
        let config = EngineConfig::default().with_interval_level(2.0);
        assert!(fit_entity(series, latest, None, &config).is_err());
    }
}
