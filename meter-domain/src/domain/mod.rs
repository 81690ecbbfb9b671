pub mod meter;
pub mod period;
pub mod series;

pub use meter::Meter;
pub use period::{Period, PeriodParseError, Season};
pub use series::{ConsumptionSeries, Reading, SeriesError};
