use std::{fs::File, path::PathBuf};

use csv::StringRecord;

use super::{ConsumptionRecord, SourceError};
use crate::pipeline::{RecordStream, Source};

/// Long-format consumption CSV, one row per meter and month.
///
/// Expected header columns (by name, any order, extra columns ignored):
/// - meter_id
/// - building_id
/// - period (`YYYY-MM` or `YYYY/MM`)
/// - value (empty or unparseable cells read as 0; `165,80` is accepted)
pub struct ConsumptionCsvFileSource {
    path: PathBuf,
}

impl ConsumptionCsvFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

struct Columns {
    meter_id: usize,
    building_id: usize,
    period: usize,
    value: usize,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self, SourceError> {
        let find = |name: &'static str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or(SourceError::MissingColumn(name))
        };
        Ok(Self {
            meter_id: find("meter_id")?,
            building_id: find("building_id")?,
            period: find("period")?,
            value: find("value")?,
        })
    }
}

/// Consumption cell to a non-negative number. `None` means the cell had to
/// be coerced to 0.
fn parse_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let v: f64 = trimmed.replace(',', ".").parse().ok()?;
    (v.is_finite() && v >= 0.0).then_some(v)
}

fn record_to_consumption(record: &StringRecord, cols: &Columns, row: u64) -> Result<ConsumptionRecord, SourceError> {
    let field = |idx: usize, column: &'static str| -> Result<&str, SourceError> {
        match record.get(idx).map(str::trim) {
            Some(s) if !s.is_empty() => Ok(s),
            _ => Err(SourceError::EmptyField { row, column }),
        }
    };

    let meter_id = field(cols.meter_id, "meter_id")?.to_string();
    let building_id = field(cols.building_id, "building_id")?.to_string();
    let period = field(cols.period, "period")?
        .parse()
        .map_err(|source| SourceError::Period { row, source })?;

    let raw = record.get(cols.value).unwrap_or("");
    let value = match parse_value(raw) {
        Some(v) => v,
        None => {
            metrics::counter!("consumption_csv_coerced_values_total").increment(1);
            tracing::debug!(row, meter_id = %meter_id, raw, "value coerced to 0");
            0.0
        }
    };

    Ok(ConsumptionRecord {
        meter_id,
        building_id,
        period,
        value,
    })
}

#[async_trait::async_trait]
impl Source<ConsumptionRecord> for ConsumptionCsvFileSource {
    async fn stream(&self) -> RecordStream<ConsumptionRecord> {
        // Blocking reader inside the stream; input files are small monthly exports.
        let path = self.path.clone();
        let s = async_stream::try_stream! {
            let file = File::open(&path)?;
            let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(file);
            let cols = Columns::from_headers(rdr.headers()?)?;

            for (i, result) in rdr.records().enumerate() {
                let record = result?;
                // Header is line 1.
                let row = i as u64 + 2;
                yield record_to_consumption(&record, &cols, row)?;
            }
        };

        Box::pin(s)
    }
}
