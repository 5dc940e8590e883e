//! Monthly series data structure for a single entity.

use super::month::{add_months, format_month, month_ordinal, parse_month};
use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

/// A contiguous monthly series for one entity (a store, a region, ...).
///
/// Values are non-negative; a missing month is stored as `NaN`. Dates are
/// normalized to the first day of the month and must advance by exactly one
/// month per observation.
///
/// With the `serde` feature, deserialization runs the same checks as
/// [`MonthlySeries::new`]; missing months may be written as `null`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawMonthlySeries"))]
pub struct MonthlySeries {
    name: String,
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
    metadata: BTreeMap<String, String>,
}

/// Unchecked wire form of a [`MonthlySeries`].
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawMonthlySeries {
    name: String,
    dates: Vec<NaiveDate>,
    values: Vec<Option<f64>>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

#[cfg(feature = "serde")]
impl TryFrom<RawMonthlySeries> for MonthlySeries {
    type Error = ForecastError;

    fn try_from(raw: RawMonthlySeries) -> Result<Self> {
        let values = raw
            .values
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        MonthlySeries::new(raw.name, raw.dates, values, raw.metadata)
    }
}

/// Builder for constructing a [`MonthlySeries`].
#[derive(Debug, Clone, Default)]
pub struct MonthlySeriesBuilder {
    name: String,
    dates: Vec<NaiveDate>,
    date_strings: Vec<String>,
    values: Vec<f64>,
    metadata: BTreeMap<String, String>,
}

impl MonthlySeriesBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn dates(mut self, dates: Vec<NaiveDate>) -> Self {
        self.dates = dates;
        self
    }

    /// Set dates from `YYYY-MM` / `YYYY/MM` strings, parsed at build time.
    pub fn date_strings<S: AsRef<str>>(mut self, dates: &[S]) -> Self {
        self.date_strings = dates.iter().map(|d| d.as_ref().to_string()).collect();
        self
    }

    /// Set dates as `len` consecutive months starting at `start`.
    pub fn monthly_from(mut self, start: NaiveDate, len: usize) -> Self {
        self.dates = (0..len as i64).map(|i| add_months(start, i)).collect();
        self
    }

    pub fn values(mut self, values: Vec<f64>) -> Self {
        self.values = values;
        self
    }

    /// Attach a free-form grouping label. Passed through unmodified.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<MonthlySeries> {
        let dates = if self.date_strings.is_empty() {
            self.dates
        } else {
            self.date_strings
                .iter()
                .map(|s| parse_month(s))
                .collect::<Result<Vec<_>>>()?
        };
        MonthlySeries::new(self.name, dates, self.values, self.metadata)
    }
}

impl MonthlySeries {
    /// Create a series, validating length, contiguity and sign.
    pub fn new(
        name: impl Into<String>,
        dates: Vec<NaiveDate>,
        values: Vec<f64>,
        metadata: BTreeMap<String, String>,
    ) -> Result<Self> {
        if dates.is_empty() {
            return Err(ForecastError::EmptyData);
        }
        if dates.len() != values.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: dates.len(),
                got: values.len(),
            });
        }

        let dates: Vec<NaiveDate> = dates.into_iter().map(first_of_month).collect();
        for i in 1..dates.len() {
            if month_ordinal(dates[i]) - month_ordinal(dates[i - 1]) != 1 {
                return Err(ForecastError::GapInSeries {
                    index: i,
                    previous: format_month(dates[i - 1]),
                    next: format_month(dates[i]),
                });
            }
        }

        // Infinite values are treated as missing, same as NaN.
        let mut cleaned = Vec::with_capacity(values.len());
        for (index, &value) in values.iter().enumerate() {
            if value < 0.0 {
                return Err(ForecastError::NegativeValue { index, value });
            }
            cleaned.push(if value.is_finite() { value } else { f64::NAN });
        }

        Ok(Self {
            name: name.into(),
            dates,
            values: cleaned,
            metadata,
        })
    }

    /// Create a series from date strings and values.
    ///
    /// # Example
    /// ```
    /// use anofox_growth::core::MonthlySeries;
    ///
    /// let series = MonthlySeries::from_strings(
    ///     "store-1",
    ///     &["2023-11", "2023-12", "2024/01"],
    ///     vec![10.0, 12.0, f64::NAN],
    /// )
    /// .unwrap();
    /// assert_eq!(series.len(), 3);
    /// assert_eq!(series.observed_count(), 2);
    /// ```
    pub fn from_strings<S: AsRef<str>>(
        name: impl Into<String>,
        dates: &[S],
        values: Vec<f64>,
    ) -> Result<Self> {
        MonthlySeriesBuilder::new(name)
            .date_strings(dates)
            .values(values)
            .build()
    }

    pub fn builder(name: impl Into<String>) -> MonthlySeriesBuilder {
        MonthlySeriesBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of months covered, including missing ones.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn first_date(&self) -> NaiveDate {
        self.dates[0]
    }

    pub fn last_date(&self) -> NaiveDate {
        self.dates[self.dates.len() - 1]
    }

    /// Number of months with a value present.
    pub fn observed_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_finite()).count()
    }

    /// Position of the given month within the series, if covered.
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        let offset = month_ordinal(date) - month_ordinal(self.first_date());
        if offset >= 0 && (offset as usize) < self.len() {
            Some(offset as usize)
        } else {
            None
        }
    }

    /// Date of month `t`, extrapolating past either end of the series.
    pub fn date_at(&self, t: i64) -> NaiveDate {
        add_months(self.first_date(), t)
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day0(0).unwrap_or(date)
}
