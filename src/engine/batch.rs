//! Fitting many entities with shared peer priors.
//!
//! Entities are fitted in three parallel waves separated by barriers:
//!
//! 1. long histories (more than `tightened_max_valid` valid months), free `k`;
//! 2. short but fittable histories, with `k` held near the median of wave 1;
//! 3. startup entities, borrowing `k` and seasonality from waves 1 and 2.
//!
//! Each wave is an independent parallel map, and every summary is built
//! before the next wave starts and shared read-only.

use super::config::EngineConfig;
use super::entity::{fit_validated, EntityModel};
use super::summary::GlobalSummary;
use crate::core::MonthlySeries;
use crate::detection::build_mask;
use crate::error::Result;
use crate::utils::stats::gini;
use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::info;

/// Result of [`fit_batch`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatchOutput {
    /// One model per input entity, in input order.
    pub models: Vec<EntityModel>,
    /// Peer summary used for startup entities, if any entity was fitted.
    pub summary: Option<GlobalSummary>,
    /// Gini coefficient of entity totals.
    pub concentration_gini: f64,
}

/// Fit every entity, sharing peer statistics from long to short histories.
///
/// A degenerate entity never fails the batch; it comes back flagged as
/// insufficient. Only an invalid `config` is an error.
///
/// # Example
/// ```
/// use anofox_growth::core::MonthlySeries;
/// use anofox_growth::engine::{fit_batch, EngineConfig, EntityStatus};
/// use chrono::NaiveDate;
///
/// let start = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
/// let curve = |t: usize| 50.0 + 40.0 / (1.0 + (-0.1 * (t as f64 - 20.0)).exp());
///
/// let mature = MonthlySeries::builder("mature")
///     .monthly_from(start, 48)
///     .values((0..48).map(curve).collect())
///     .build()
///     .unwrap();
/// let young = MonthlySeries::builder("young")
///     .monthly_from(NaiveDate::from_ymd_opt(2018, 7, 1).unwrap(), 6)
///     .values(vec![20.0, 22.0, 25.0, 27.0, 30.0, 33.0])
///     .build()
///     .unwrap();
///
/// let output = fit_batch(vec![mature, young], &EngineConfig::default()).unwrap();
/// assert_eq!(output.models[0].status, EntityStatus::Fitted);
/// assert_eq!(output.models[1].status, EntityStatus::Startup);
/// ```
pub fn fit_batch(entities: Vec<MonthlySeries>, config: &EngineConfig) -> Result<BatchOutput> {
    config.validate()?;

    let Some(global_max) = entities.iter().map(MonthlySeries::last_date).max() else {
        return Ok(BatchOutput {
            models: Vec::new(),
            summary: None,
            concentration_gini: 0.0,
        });
    };
    let total = entities.len();

    let valid_counts: Vec<usize> = entities
        .par_iter()
        .map(|s| build_mask(s.values(), &config.mask).valid_count())
        .collect();

    let mut long = Vec::new();
    let mut medium = Vec::new();
    let mut short = Vec::new();
    for (index, (series, valid)) in entities.into_iter().zip(valid_counts).enumerate() {
        if valid > config.fit.tightened_max_valid {
            long.push((index, series));
        } else if valid >= config.fit.min_valid {
            medium.push((index, series));
        } else {
            short.push((index, series));
        }
    }
    info!(
        entities = total,
        long = long.len(),
        medium = medium.len(),
        startup = short.len(),
        "fitting batch"
    );

    let long_models = fit_wave(long, global_max, None, config);
    let provisional = GlobalSummary::from_models(long_models.iter().map(|(_, m)| m));
    info!(
        fitted = long_models.len(),
        median_k = ?provisional.as_ref().map(|s| s.median_k),
        "long histories fitted"
    );

    let medium_models = fit_wave(medium, global_max, provisional.as_ref(), config);
    let summary = GlobalSummary::from_models(
        long_models
            .iter()
            .chain(medium_models.iter())
            .map(|(_, m)| m),
    );
    info!(
        fitted = medium_models.len(),
        median_k = ?summary.as_ref().map(|s| s.median_k),
        peers = summary.as_ref().map_or(0, |s| s.entity_count),
        "global summary ready"
    );

    let short_models = fit_wave(short, global_max, summary.as_ref(), config);
    info!(fitted = short_models.len(), "startup entities fitted");

    let mut slots: Vec<Option<EntityModel>> = (0..total).map(|_| None).collect();
    for (index, model) in long_models
        .into_iter()
        .chain(medium_models)
        .chain(short_models)
    {
        slots[index] = Some(model);
    }
    let models: Vec<EntityModel> = slots.into_iter().flatten().collect();

    let totals: Vec<f64> = models.iter().map(|m| m.derived_stats.total).collect();

    Ok(BatchOutput {
        concentration_gini: gini(&totals),
        models,
        summary,
    })
}

/// Fit one wave of entities in parallel, keeping their input positions.
fn fit_wave(
    wave: Vec<(usize, MonthlySeries)>,
    global_max: NaiveDate,
    summary: Option<&GlobalSummary>,
    config: &EngineConfig,
) -> Vec<(usize, EntityModel)> {
    wave.into_par_iter()
        .map(|(index, series)| (index, fit_validated(series, global_max, summary, config)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EntityStatus;

    fn series(name: &str, start: (i32, u32), values: Vec<f64>) -> MonthlySeries {
        let n = values.len();
        MonthlySeries::builder(name)
            .monthly_from(NaiveDate::from_ymd_opt(start.0, start.1, 1).unwrap(), n)
            .values(values)
            .build()
            .unwrap()
    }

    fn curve(n: usize, l: f64, k: f64) -> Vec<f64> {
        (0..n)
            .map(|t| 100.0 + l / (1.0 + (-k * (t as f64 - n as f64 / 2.0)).exp()))
            .collect()
    }

    #[test]
    fn empty_batch_is_empty() {
        let output = fit_batch(Vec::new(), &EngineConfig::default()).unwrap();
        assert!(output.models.is_empty());
        assert!(output.summary.is_none());
        assert_eq!(output.concentration_gini, 0.0);
    }

    #[test]
    fn output_preserves_input_order() {
        let entities = vec![
            series("startup", (2019, 7), vec![10.0, 11.0, 12.0, 13.0, 14.0]),
            series("long", (2010, 1), curve(48, 60.0, 0.1)),
            series("medium", (2012, 1), curve(24, 40.0, 0.2)),
        ];
        let output = fit_batch(entities, &EngineConfig::default()).unwrap();

        let names: Vec<&str> = output.models.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["startup", "long", "medium"]);
        assert_eq!(output.models[0].status, EntityStatus::Startup);
        assert_eq!(output.models[1].status, EntityStatus::Fitted);
        assert_eq!(output.models[2].status, EntityStatus::Fitted);
    }

    #[test]
    fn startup_entities_use_the_final_summary() {
        let entities = vec![
            series("a", (2010, 1), curve(48, 60.0, 0.1)),
            series("b", (2010, 1), curve(40, 30.0, 0.2)),
            series("c", (2013, 7), vec![5.0, 6.0, 8.0, 9.0, 11.0, 12.0]),
        ];
        let output = fit_batch(entities, &EngineConfig::default()).unwrap();
        let summary = output.summary.clone().unwrap();

        assert_eq!(summary.entity_count, 2);
        let startup = &output.models[2];
        assert_eq!(startup.status, EntityStatus::Startup);
        assert_eq!(startup.fit.params.k, summary.median_k);
        assert_eq!(startup.seasonal, summary.median_seasonality);
    }

    #[test]
    fn batch_without_fittable_entities_marks_everything_insufficient() {
        let entities = vec![
            series("x", (2020, 1), vec![1.0, 2.0, 3.0, 4.0]),
            series("y", (2020, 1), vec![0.0, 0.0, 0.0]),
        ];
        let output = fit_batch(entities, &EngineConfig::default()).unwrap();
        assert!(output.summary.is_none());
        assert!(output
            .models
            .iter()
            .all(|m| m.status == EntityStatus::InsufficientData));
    }

    #[test]
    fn activity_is_relative_to_newest_entity() {
        let entities = vec![
            series("current", (2010, 1), curve(48, 60.0, 0.1)),
            series("closed", (2010, 1), curve(36, 60.0, 0.1)),
        ];
        let output = fit_batch(entities, &EngineConfig::default()).unwrap();
        assert!(output.models[0].is_active);
        assert!(!output.models[1].is_active);
    }

    #[test]
    fn concentration_reflects_entity_totals() {
        let entities = vec![
            series("a", (2010, 1), vec![100.0; 24]),
            series("b", (2010, 1), vec![100.0; 24]),
        ];
        let output = fit_batch(entities, &EngineConfig::default()).unwrap();
        assert!(output.concentration_gini.abs() < 1e-12);
    }
}
