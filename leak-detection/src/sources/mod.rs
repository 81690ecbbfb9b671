pub mod consumption_csv_file;

use meter_domain::{Period, PeriodParseError};

pub use consumption_csv_file::ConsumptionCsvFileSource;

/// One billed month of one meter, as read from an input file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionRecord {
    pub meter_id: String,
    pub building_id: String,
    pub period: Period,
    /// Already coerced: never negative, never NaN.
    pub value: f64,
}

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("failed to open input file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing column '{0}' in CSV header")]
    MissingColumn(&'static str),
    #[error("row {row}: empty {column}")]
    EmptyField { row: u64, column: &'static str },
    #[error("row {row}: {source}")]
    Period {
        row: u64,
        #[source]
        source: PeriodParseError,
    },
}
