//! Per-entity fitting and the two-pass batch.
//!
//! [`fit_entity`] runs the whole pipeline for one series: outlier mask,
//! baseline, break detection, curve selection, seasonality and the residual
//! nudge. [`fit_batch`] fits many entities in parallel and passes peer
//! medians from long histories to short ones through a [`GlobalSummary`].

mod batch;
mod config;
mod entity;
mod stats;
mod summary;

pub use batch::{fit_batch, BatchOutput};
pub use config::EngineConfig;
pub use entity::{fit_entity, EntityModel, EntityStatus};
pub use stats::DerivedStats;
pub use summary::GlobalSummary;
