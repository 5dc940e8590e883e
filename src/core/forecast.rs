//! Forecast result structure for holding monthly projections.

use crate::error::{ForecastError, Result};
use chrono::NaiveDate;

/// A monthly forecast: one date per step, point predictions and optional
/// prediction intervals.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Forecast {
    dates: Vec<NaiveDate>,
    point: Vec<f64>,
    lower: Option<Vec<f64>>,
    upper: Option<Vec<f64>>,
}

impl Forecast {
    /// Create an empty forecast.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a forecast from dated point predictions.
    pub fn from_values(dates: Vec<NaiveDate>, point: Vec<f64>) -> Result<Self> {
        if dates.len() != point.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: dates.len(),
                got: point.len(),
            });
        }
        Ok(Self {
            dates,
            point,
            lower: None,
            upper: None,
        })
    }

    /// Create a forecast with prediction intervals.
    pub fn from_values_with_intervals(
        dates: Vec<NaiveDate>,
        point: Vec<f64>,
        lower: Vec<f64>,
        upper: Vec<f64>,
    ) -> Result<Self> {
        let n = dates.len();
        for got in [point.len(), lower.len(), upper.len()] {
            if got != n {
                return Err(ForecastError::DimensionMismatch { expected: n, got });
            }
        }
        Ok(Self {
            dates,
            point,
            lower: Some(lower),
            upper: Some(upper),
        })
    }

    /// Number of forecast steps.
    pub fn horizon(&self) -> usize {
        self.point.len()
    }

    pub fn is_empty(&self) -> bool {
        self.point.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Point predictions.
    pub fn point(&self) -> &[f64] {
        &self.point
    }

    pub fn has_intervals(&self) -> bool {
        self.lower.is_some() && self.upper.is_some()
    }

    pub fn lower(&self) -> Option<&[f64]> {
        self.lower.as_deref()
    }

    pub fn upper(&self) -> Option<&[f64]> {
        self.upper.as_deref()
    }

    /// Iterate `(date, point)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.point.iter().copied())
    }
}
