//! Core data structures for monthly entity series.

mod forecast;
mod month;
mod time_series;

pub use forecast::Forecast;
pub use month::{add_months, calendar_month, days_between, format_month, month_ordinal, parse_month};
pub use time_series::{MonthlySeries, MonthlySeriesBuilder};
