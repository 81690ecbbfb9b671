pub mod domain;

pub use domain::{ConsumptionSeries, Meter, Period, PeriodParseError, Reading, Season, SeriesError};
