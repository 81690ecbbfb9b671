use serde::{Deserialize, Serialize};

use super::period::Period;

/// One monthly consumption reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub period: Period,
    pub value: f64,
}

impl Reading {
    pub fn new(period: Period, value: f64) -> Self {
        Self { period, value }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    #[error("consumption series must contain at least one reading")]
    Empty,
    #[error("period {0} appears more than once")]
    DuplicatePeriod(Period),
    #[error("period {later} does not follow {earlier}")]
    OutOfOrder { earlier: Period, later: Period },
    #[error("value {value} at {period} is negative or not finite")]
    InvalidValue { period: Period, value: f64 },
}

/// Chronologically ordered monthly readings of a single meter.
///
/// Invariants: at least one reading, strictly increasing periods, finite
/// non-negative values. Missing months are simply absent; a month the
/// ingestion layer could not parse arrives here as `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumptionSeries {
    readings: Vec<Reading>,
}

impl ConsumptionSeries {
    pub fn new(readings: Vec<Reading>) -> Result<Self, SeriesError> {
        if readings.is_empty() {
            return Err(SeriesError::Empty);
        }

        for r in &readings {
            if !r.value.is_finite() || r.value < 0.0 {
                return Err(SeriesError::InvalidValue {
                    period: r.period,
                    value: r.value,
                });
            }
        }

        for pair in readings.windows(2) {
            let (earlier, later) = (pair[0].period, pair[1].period);
            if earlier == later {
                return Err(SeriesError::DuplicatePeriod(later));
            }
            if earlier > later {
                return Err(SeriesError::OutOfOrder { earlier, later });
            }
        }

        Ok(Self { readings })
    }

    /// Sort by period first, then validate. Duplicates are still rejected.
    pub fn from_unordered(mut readings: Vec<Reading>) -> Result<Self, SeriesError> {
        readings.sort_by_key(|r| r.period);
        Self::new(readings)
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.readings.iter()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// Always false for a constructed series; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.readings.iter().map(|r| r.value).collect()
    }

    pub fn positive_values(&self) -> Vec<f64> {
        self.readings
            .iter()
            .map(|r| r.value)
            .filter(|v| *v > 0.0)
            .collect()
    }

    pub fn first_period(&self) -> Period {
        self.readings[0].period
    }

    pub fn last_period(&self) -> Period {
        self.readings[self.readings.len() - 1].period
    }
}

impl<'de> Deserialize<'de> for ConsumptionSeries {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            readings: Vec<Reading>,
        }

        let raw = Raw::deserialize(deserializer)?;
        ConsumptionSeries::new(raw.readings).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Month;

    fn p(month: Month) -> Period {
        Period::new(2022, month)
    }

    #[test]
    fn accepts_strictly_increasing_periods() {
        let s = ConsumptionSeries::new(vec![
            Reading::new(p(Month::January), 10.0),
            Reading::new(p(Month::February), 0.0),
            Reading::new(p(Month::April), 12.5),
        ])
        .unwrap();
        assert_eq!(s.len(), 3);
        assert_eq!(s.values(), vec![10.0, 0.0, 12.5]);
        assert_eq!(s.positive_values(), vec![10.0, 12.5]);
        assert_eq!(s.last_period(), p(Month::April));
    }

    #[test]
    fn rejects_empty_duplicate_and_negative() {
        assert_eq!(ConsumptionSeries::new(vec![]), Err(SeriesError::Empty));

        let dup = ConsumptionSeries::new(vec![
            Reading::new(p(Month::March), 1.0),
            Reading::new(p(Month::March), 2.0),
        ]);
        assert!(matches!(dup, Err(SeriesError::DuplicatePeriod(_))));

        let neg = ConsumptionSeries::new(vec![Reading::new(p(Month::March), -1.0)]);
        assert!(matches!(neg, Err(SeriesError::InvalidValue { .. })));
    }

    #[test]
    fn from_unordered_sorts_before_validating() {
        let s = ConsumptionSeries::from_unordered(vec![
            Reading::new(p(Month::May), 5.0),
            Reading::new(p(Month::January), 1.0),
        ])
        .unwrap();
        assert_eq!(s.first_period(), p(Month::January));

        let out_of_order = ConsumptionSeries::new(vec![
            Reading::new(p(Month::May), 5.0),
            Reading::new(p(Month::January), 1.0),
        ]);
        assert!(matches!(out_of_order, Err(SeriesError::OutOfOrder { .. })));
    }
}
