//! End-to-end scenarios for single entities and batches.

use anofox_growth::core::{format_month, MonthlySeries};
use anofox_growth::detection::MaskConfig;
use anofox_growth::engine::{
    fit_batch, fit_entity, EngineConfig, EntityModel, EntityStatus, GlobalSummary,
};
use anofox_growth::models::{logistic, FitMode};
use anofox_growth::seasonality::SeasonalProfile;
use anofox_growth::ForecastError;
use approx::assert_relative_eq;
use chrono::NaiveDate;

fn monthly(name: &str, start: (i32, u32), values: Vec<f64>) -> MonthlySeries {
    let n = values.len();
    MonthlySeries::builder(name)
        .monthly_from(NaiveDate::from_ymd_opt(start.0, start.1, 1).unwrap(), n)
        .values(values)
        .build()
        .unwrap()
}

fn fit_alone(series: MonthlySeries, config: &EngineConfig) -> EntityModel {
    let latest = series.last_date();
    fit_entity(series, latest, None, config).unwrap()
}

// =============================================================================
// Model selection
// =============================================================================

#[test]
fn smooth_logistic_selects_standard() {
    let values: Vec<f64> = (0..48)
        .map(|t| 100.0 + logistic(t as f64, 60.0, 0.08, 24.0))
        .collect();
    let model = fit_alone(monthly("smooth", (2010, 1), values), &EngineConfig::default());

    assert_eq!(model.status, EntityStatus::Fitted);
    assert_eq!(model.fit.mode, FitMode::Standard);
    assert!(model.breaks.single.is_none());
    assert!(model.fit.aic.is_finite());
}

#[test]
fn steep_logistic_without_break_selects_standard() {
    let mut scanned = false;
    for k in [0.9, 1.0, 1.5, 2.0] {
        let values: Vec<f64> = (0..48)
            .map(|t| 10.0 + logistic(t as f64, 500.0, k, 24.0))
            .collect();
        let model = fit_alone(monthly("steep", (2010, 1), values), &EngineConfig::default());

        scanned |= model.breaks.single.is_some();
        assert_eq!(model.fit.mode, FitMode::Standard, "k = {k}");
        assert!(model.fit.params.shift.is_none());
        assert_relative_eq!(model.fit.params.l, 500.0, max_relative = 0.01);
    }
    assert!(scanned, "no grid curve produced a break candidate");
}

#[test]
fn clean_step_selects_shift_near_the_step() {
    let values: Vec<f64> = (0..48)
        .map(|t| {
            let step = if t >= 24 { 40.0 } else { 0.0 };
            100.0 + logistic(t as f64, 20.0, 0.05, 24.0) + step
        })
        .collect();
    let model = fit_alone(monthly("step", (2010, 1), values), &EngineConfig::default());

    assert_eq!(model.fit.mode, FitMode::Shift);
    let index = model.fit.break_index.unwrap();
    assert!(index.abs_diff(24) <= 1, "break at {index}");
}

#[test]
fn event_drop_and_later_recovery_selects_dual_shift() {
    // 2016-01 .. 2023-12 on a gentle ramp: drop at 2020-03 (index 50),
    // recovery at index 74.
    let values: Vec<f64> = (0..96)
        .map(|t| {
            let level = match t {
                0..=49 => 100.0,
                50..=73 => 85.0,
                _ => 105.0,
            };
            level + 0.2 * t as f64
        })
        .collect();
    let config =
        EngineConfig::default().with_mask(MaskConfig::default().with_iqr_multiplier(100.0));
    let model = fit_alone(monthly("shock", (2016, 1), values), &config);

    let (anchor, second) = model.breaks.dual.unwrap();
    assert_eq!(anchor.index, 50);
    assert_eq!(second.index, 74);
    assert_eq!(model.fit.mode, FitMode::DualShift);
    assert_eq!(model.fit.break_index, Some(50));
    assert_eq!(model.fit.break_index2, Some(74));
    assert!(model.fit.params.shift.unwrap() < 0.0);
    assert!(model.fit.params.shift2.unwrap() > 0.0);
}

#[test]
fn event_month_can_be_moved() {
    let config = EngineConfig::default().with_event_month("2012-06").unwrap();
    let values: Vec<f64> = (0..48)
        .map(|t| 100.0 + logistic(t as f64, 60.0, 0.08, 24.0))
        .collect();
    let model = fit_alone(monthly("moved", (2010, 1), values), &config);
    assert_eq!(model.breaks.fixed.map(|b| b.index), Some(29));
}

// =============================================================================
// Startup and insufficient entities
// =============================================================================

#[test]
fn startup_entity_copies_median_k() {
    let summary = GlobalSummary::new(0.12, SeasonalProfile::flat(), 25);
    let series = monthly("new-store", (2024, 1), vec![40.0, 45.0, 52.0, 58.0, 66.0, 71.0, 80.0]);
    let latest = series.last_date();
    let model = fit_entity(series, latest, Some(&summary), &EngineConfig::default()).unwrap();

    assert_eq!(model.status, EntityStatus::Startup);
    assert_eq!(model.fit.mode, FitMode::Startup);
    assert_eq!(model.fit.params.k, 0.12);
    assert!(model.forecast(6).is_ok());
}

#[test]
fn insufficient_entity_cannot_forecast() {
    let series = monthly("tiny", (2024, 1), vec![0.0, 3.0, f64::NAN]);
    let latest = series.last_date();
    let model = fit_entity(series, latest, None, &EngineConfig::default()).unwrap();

    assert_eq!(model.status, EntityStatus::InsufficientData);
    assert_eq!(model.mask.len(), 3);
    assert_eq!(model.mask.valid_count(), 0);
    assert_eq!(model.fit.params.l, 0.0);
    assert_eq!(model.seasonal, SeasonalProfile::flat());
    assert!(!model.is_forecastable());
    assert!(matches!(
        model.forecast(3),
        Err(ForecastError::InsufficientData { .. })
    ));
}

// =============================================================================
// Residual correction
// =============================================================================

#[test]
fn series_ending_low_gets_negative_nudge() {
    let mut values: Vec<f64> = (0..48)
        .map(|t| 100.0 + logistic(t as f64, 60.0, 0.3, 10.0))
        .collect();
    for v in values.iter_mut().skip(45) {
        *v *= 0.3;
    }
    let model = fit_alone(monthly("slump", (2012, 1), values), &EngineConfig::default());

    // The slump is masked, so it does not drag the trend down.
    assert!(!model.mask.is_valid(47));
    assert!(model.correction.nudge < 0.0, "nudge {}", model.correction.nudge);
    assert_eq!(model.correction.nudge_decay, 1.0);

    let first = model.forecast(1).unwrap().point()[0];
    let trend_only = model.trend(48.0) * model.seasonal.factor(0);
    assert!(first < trend_only);
}

// =============================================================================
// Batch behaviour
// =============================================================================

fn curve(n: usize, l: f64, k: f64) -> Vec<f64> {
    (0..n)
        .map(|t| 100.0 + logistic(t as f64, l, k, n as f64 / 2.0))
        .collect()
}

#[test]
fn medium_history_k_is_held_near_long_history_median() {
    let entities = vec![
        monthly("long", (2010, 1), curve(48, 60.0, 0.1)),
        monthly("medium", (2012, 1), curve(24, 60.0, 0.6)),
    ];
    let output = fit_batch(entities, &EngineConfig::default()).unwrap();

    let long_k = output.models[0].fit.params.k;
    let medium_k = output.models[1].fit.params.k;
    assert!(medium_k <= 1.5 * long_k + 1e-9, "{medium_k} vs {long_k}");
    assert!(medium_k >= 0.5 * long_k - 1e-9, "{medium_k} vs {long_k}");

    let summary = output.summary.unwrap();
    assert_eq!(summary.entity_count, 2);
}

#[test]
fn batch_mixes_all_statuses() {
    let entities = vec![
        monthly("long", (2010, 1), curve(48, 60.0, 0.1)),
        monthly("startup", (2013, 6), vec![30.0, 34.0, 37.0, 41.0, 44.0, 48.0, 51.0]),
        monthly("broken", (2013, 10), vec![0.0, 0.0, 0.0]),
    ];
    let output = fit_batch(entities, &EngineConfig::default()).unwrap();

    let statuses: Vec<EntityStatus> = output.models.iter().map(|m| m.status).collect();
    assert_eq!(
        statuses,
        vec![
            EntityStatus::Fitted,
            EntityStatus::Startup,
            EntityStatus::InsufficientData
        ]
    );
    let summary = output.summary.as_ref().unwrap();
    assert_eq!(output.models[1].fit.params.k, summary.median_k);
}

#[test]
fn inactivity_uses_the_latest_month_in_the_batch() {
    let entities = vec![
        monthly("open", (2010, 1), curve(48, 60.0, 0.1)),
        monthly("lagging", (2010, 3), curve(46, 60.0, 0.1)),
        monthly("closed", (2010, 1), curve(40, 60.0, 0.1)),
    ];
    let output = fit_batch(entities, &EngineConfig::default()).unwrap();

    assert!(output.models[0].is_active);
    // Same end month as "open".
    assert!(output.models[1].is_active);
    assert!(!output.models[2].is_active);
}

#[test]
fn metadata_passes_through_unchanged() {
    let series = MonthlySeries::builder("store-7")
        .monthly_from(NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(), 30)
        .values(curve(30, 50.0, 0.2))
        .metadata("region", "west")
        .metadata("format", "mall")
        .build()
        .unwrap();
    let output = fit_batch(vec![series], &EngineConfig::default()).unwrap();
    let model = &output.models[0];

    assert_eq!(model.name(), "store-7");
    assert_eq!(model.metadata().get("region").map(String::as_str), Some("west"));
    assert_eq!(model.metadata().get("format").map(String::as_str), Some("mall"));
}

// =============================================================================
// Forecasts
// =============================================================================

#[test]
fn forecast_has_requested_length_and_month_dates() {
    let model = fit_alone(
        monthly("f", (2019, 11), curve(36, 80.0, 0.15)),
        &EngineConfig::default(),
    );
    let forecast = model.forecast(14).unwrap();

    assert_eq!(forecast.horizon(), 14);
    assert_eq!(format_month(forecast.dates()[0]), "2022-11");
    assert_eq!(format_month(forecast.dates()[13]), "2023-12");
    assert!(forecast.has_intervals());
}

#[test]
fn fitted_values_track_a_clean_curve() {
    let values = curve(48, 60.0, 0.1);
    let model = fit_alone(monthly("clean", (2010, 1), values.clone()), &EngineConfig::default());
    let fitted = model.fitted();

    assert_eq!(fitted.len(), values.len());
    for (f, v) in fitted.iter().zip(&values) {
        assert_relative_eq!(*f, *v, max_relative = 0.03);
    }
    assert_relative_eq!(model.seasonal.mean(), 1.0, epsilon = 1e-6);
    assert!(model.derived_stats.saturation > 0.0 && model.derived_stats.saturation <= 1.0 + 1e-9);
}
