use super::features::{FeatureVector, FEATURE_COUNT};

/// Per-feature standardization to zero mean and unit variance.
///
/// A feature that is constant across the batch keeps a scale of 1, so it
/// maps to 0 for every meter instead of dividing by zero.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    means: [f64; FEATURE_COUNT],
    scales: [f64; FEATURE_COUNT],
}

impl StandardScaler {
    pub fn fit(batch: &[FeatureVector]) -> Option<Self> {
        if batch.is_empty() {
            return None;
        }
        let n = batch.len() as f64;

        let mut means = [0.0; FEATURE_COUNT];
        for v in batch {
            for (m, x) in means.iter_mut().zip(v.0.iter()) {
                *m += x / n;
            }
        }

        let mut scales = [0.0; FEATURE_COUNT];
        for v in batch {
            for (i, x) in v.0.iter().enumerate() {
                scales[i] += (x - means[i]).powi(2) / n;
            }
        }
        for s in scales.iter_mut() {
            *s = if *s > f64::EPSILON { s.sqrt() } else { 1.0 };
        }

        Some(Self { means, scales })
    }

    pub fn transform(&self, v: &FeatureVector) -> Vec<f64> {
        v.0.iter()
            .enumerate()
            .map(|(i, x)| (x - self.means[i]) / self.scales[i])
            .collect()
    }
}
