//! # anofox-growth
//!
//! Per-entity growth-curve fitting and short-horizon forecasting for monthly
//! series such as store sales or customer counts.
//!
//! Each entity is decomposed into a logistic growth trend (optionally with
//! one or two structural level shifts), twelve multiplicative seasonal
//! factors and a decaying residual nudge. Entities with a short history
//! borrow the steepness and seasonality of their peers.
//!
//! ```
//! use anofox_growth::prelude::*;
//! use chrono::NaiveDate;
//!
//! let values: Vec<f64> = (0..36)
//!     .map(|t| 200.0 + 100.0 / (1.0 + (-0.2 * (t as f64 - 18.0)).exp()))
//!     .collect();
//! let series = MonthlySeries::builder("north")
//!     .monthly_from(NaiveDate::from_ymd_opt(2016, 1, 1).unwrap(), 36)
//!     .values(values)
//!     .metadata("region", "north")
//!     .build()?;
//!
//! let output = fit_batch(vec![series], &EngineConfig::default())?;
//! let model = &output.models[0];
//! assert_eq!(model.metadata()["region"], "north");
//! let forecast = model.forecast(12)?;
//! assert_eq!(forecast.horizon(), 12);
//! # Ok::<(), ForecastError>(())
//! ```

#![allow(clippy::needless_range_loop)]

pub mod core;
pub mod detection;
pub mod engine;
pub mod error;
pub mod models;
pub mod seasonality;
pub mod utils;

pub use error::{ForecastError, Result};

pub mod prelude {
    pub use crate::core::{Forecast, MonthlySeries};
    pub use crate::engine::{
        fit_batch, fit_entity, BatchOutput, EngineConfig, EntityModel, EntityStatus,
        GlobalSummary,
    };
    pub use crate::error::{ForecastError, Result};
    pub use crate::models::{project, FitMode, FitParameters};
    pub use crate::seasonality::SeasonalProfile;
}
