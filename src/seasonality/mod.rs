//! Multiplicative monthly seasonality.
//!
//! Each entity carries twelve calendar-month factors measured against its
//! own fitted trend. Entities without enough history borrow the element-wise
//! median profile of their peers.

mod profile;

pub use profile::{extract_seasonality, SeasonalProfile, MIN_TREND};
