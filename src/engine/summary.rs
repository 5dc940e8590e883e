//! Peer statistics shared from long-history entities to short ones.

use super::entity::{EntityModel, EntityStatus};
use crate::seasonality::SeasonalProfile;
use crate::utils::stats::median;

/// Medians over fully fitted entities, used as priors for the rest.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GlobalSummary {
    /// Median logistic steepness.
    pub median_k: f64,
    /// Element-wise median seasonal profile, renormalized to mean 1.
    pub median_seasonality: SeasonalProfile,
    /// Number of entities the medians were taken over.
    pub entity_count: usize,
}

impl GlobalSummary {
    pub fn new(median_k: f64, median_seasonality: SeasonalProfile, entity_count: usize) -> Self {
        Self {
            median_k,
            median_seasonality,
            entity_count,
        }
    }

    /// Summarize the [`EntityStatus::Fitted`] models among `models`.
    ///
    /// Returns `None` when no model qualifies.
    pub fn from_models<'a, I>(models: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a EntityModel>,
    {
        let fitted: Vec<&EntityModel> = models
            .into_iter()
            .filter(|m| m.status == EntityStatus::Fitted && m.fit.params.k.is_finite())
            .collect();
        if fitted.is_empty() {
            return None;
        }

        let ks: Vec<f64> = fitted.iter().map(|m| m.fit.params.k).collect();
        let profiles: Vec<SeasonalProfile> = fitted.iter().map(|m| m.seasonal).collect();

        Some(Self {
            median_k: median(&ks),
            median_seasonality: SeasonalProfile::median_of(&profiles),
            entity_count: fitted.len(),
        })
    }
}
