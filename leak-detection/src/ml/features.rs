use meter_domain::ConsumptionSeries;

use crate::stats;

pub const FEATURE_COUNT: usize = 10;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "mean",
    "std",
    "cv",
    "max",
    "min",
    "range",
    "zero_count",
    "trend",
    "q1",
    "q3",
];

/// Fixed-size numeric summary of one meter, ordered as [`FEATURE_NAMES`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES.iter().position(|n| *n == name).map(|i| self.0[i])
    }
}

pub struct FeatureExtractor;

impl FeatureExtractor {
    pub const MIN_POSITIVE: usize = 3;

    /// `None` when the series has fewer than three positive readings.
    ///
    /// Location, spread, min and quartiles use positive readings only; max,
    /// zero count and trend slope use every reading.
    pub fn extract(series: &ConsumptionSeries) -> Option<FeatureVector> {
        let values = series.values();
        let positive = series.positive_values();
        if positive.len() < Self::MIN_POSITIVE {
            return None;
        }

        let mean = stats::mean(&positive)?;
        let std = stats::population_std(&positive)?;
        let cv = if mean > 0.0 { std / mean } else { 0.0 };
        let max = values.iter().copied().fold(f64::MIN, f64::max);
        let min = positive.iter().copied().fold(f64::MAX, f64::min);
        let zero_count = values.iter().filter(|v| **v == 0.0).count() as f64;
        let trend = stats::ols_slope(&values).unwrap_or(0.0);

        let mut sorted = positive;
        sorted.sort_by(f64::total_cmp);
        let q1 = stats::percentile_sorted(&sorted, 25.0)?;
        let q3 = stats::percentile_sorted(&sorted, 75.0)?;

        Some(FeatureVector([
            mean,
            std,
            cv,
            max,
            min,
            max - min,
            zero_count,
            trend,
            q1,
            q3,
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::series;

    #[test]
    fn extracts_all_features() {
        let f = FeatureExtractor::extract(&series(&[10.0, 0.0, 20.0, 30.0, 40.0])).unwrap();
        assert_eq!(f.get("mean"), Some(25.0));
        assert_eq!(f.get("max"), Some(40.0));
        assert_eq!(f.get("min"), Some(10.0));
        assert_eq!(f.get("range"), Some(30.0));
        assert_eq!(f.get("zero_count"), Some(1.0));
        assert_eq!(f.get("q1"), Some(17.5));
        assert_eq!(f.get("q3"), Some(32.5));
        let std = f.get("std").unwrap();
        assert!((std - 125.0f64.sqrt()).abs() < 1e-12);
        assert!((f.get("cv").unwrap() - std / 25.0).abs() < 1e-12);
        assert!(f.get("trend").unwrap() > 0.0);
    }

    #[test]
    fn needs_three_positive_readings() {
        assert!(FeatureExtractor::extract(&series(&[0.0, 5.0, 0.0, 7.0])).is_none());
    }
}
