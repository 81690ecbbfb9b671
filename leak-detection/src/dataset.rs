//! Groups ingested rows into per-meter series.

use std::collections::BTreeMap;

use futures::{Stream, TryStreamExt};
use meter_domain::{ConsumptionSeries, Meter, Period, Reading, SeriesError};

use crate::sources::{ConsumptionRecord, SourceError};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DatasetError {
    #[error("meter '{meter_id}' is listed under buildings '{first}' and '{second}'")]
    BuildingMismatch {
        meter_id: String,
        first: String,
        second: String,
    },
    #[error("meter '{meter_id}': {source}")]
    Series {
        meter_id: String,
        #[source]
        source: SeriesError,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// The batch handed to the engine, ordered by meter id.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    meters: Vec<Meter>,
    filled_gaps: usize,
}

struct Pending {
    building_id: String,
    readings: Vec<Reading>,
}

impl Dataset {
    /// Months missing between a meter's first and last row are filled with
    /// 0, the same as an empty cell. Months outside that span are not added.
    pub fn from_records<I>(records: I) -> Result<Self, DatasetError>
    where
        I: IntoIterator<Item = ConsumptionRecord>,
    {
        let mut pending: BTreeMap<String, Pending> = BTreeMap::new();
        for rec in records {
            let entry = pending.entry(rec.meter_id.clone()).or_insert_with(|| Pending {
                building_id: rec.building_id.clone(),
                readings: Vec::new(),
            });
            if entry.building_id != rec.building_id {
                return Err(DatasetError::BuildingMismatch {
                    meter_id: rec.meter_id,
                    first: entry.building_id.clone(),
                    second: rec.building_id,
                });
            }
            entry.readings.push(Reading::new(rec.period, rec.value));
        }

        let mut meters = Vec::with_capacity(pending.len());
        let mut filled_gaps = 0;
        for (meter_id, p) in pending {
            let series = ConsumptionSeries::from_unordered(p.readings).map_err(|source| DatasetError::Series {
                meter_id: meter_id.clone(),
                source,
            })?;
            let (series, filled) = fill_gaps(series).map_err(|source| DatasetError::Series {
                meter_id: meter_id.clone(),
                source,
            })?;
            if filled > 0 {
                tracing::debug!(meter_id = %meter_id, filled, "filled missing months with 0");
            }
            filled_gaps += filled;
            meters.push(Meter::new(meter_id, p.building_id, series));
        }

        Ok(Self { meters, filled_gaps })
    }

    /// Drain a record stream and build the dataset from it.
    pub async fn collect<S>(stream: S) -> Result<Self, LoadError>
    where
        S: Stream<Item = Result<ConsumptionRecord, SourceError>>,
    {
        let records: Vec<ConsumptionRecord> = stream.try_collect().await?;
        tracing::info!(records = records.len(), "input read");
        Ok(Self::from_records(records)?)
    }

    pub fn meters(&self) -> &[Meter] {
        &self.meters
    }

    pub fn into_meters(self) -> Vec<Meter> {
        self.meters
    }

    pub fn len(&self) -> usize {
        self.meters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meters.is_empty()
    }

    /// Months that had no row and were added as 0.
    pub fn filled_gaps(&self) -> usize {
        self.filled_gaps
    }
}

fn fill_gaps(series: ConsumptionSeries) -> Result<(ConsumptionSeries, usize), SeriesError> {
    let readings = series.readings();
    let span = readings.len();
    let mut out: Vec<Reading> = Vec::with_capacity(span);
    let mut filled = 0;

    for r in readings {
        if let Some(last) = out.last() {
            let mut next: Period = last.period.succ();
            while next < r.period {
                out.push(Reading::new(next, 0.0));
                filled += 1;
                next = next.succ();
            }
        }
        out.push(*r);
    }

    if filled == 0 {
        return Ok((series, 0));
    }
    Ok((ConsumptionSeries::new(out)?, filled))
}
