use std::collections::HashMap;

use meter_domain::Meter;
use rayon::prelude::*;

use super::{AnomalyEvent, AnomalyKind, DetectionContext, Detector, Severity};
use crate::{
    config::MlConfig,
    ml::{FeatureExtractor, IsolationForest, IsolationForestParams, StandardScaler},
    stats,
};

const HIGH_SCORE: f64 = 0.5;

/// Model output for one meter of the batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MlVerdict {
    pub anomaly_score: f64,
    /// Score at the `(1 - contamination)` percentile of the batch.
    pub threshold: f64,
    pub is_outlier: bool,
}

/// Batch-relative verdicts keyed by meter id.
///
/// Empty when the model was disabled or too few meters had enough positive
/// readings to be featurized.
#[derive(Debug, Clone, Default)]
pub struct MlVerdicts {
    verdicts: HashMap<String, MlVerdict>,
}

impl MlVerdicts {
    pub fn fit(meters: &[Meter], cfg: &MlConfig) -> Self {
        let featurized: Vec<(&str, _)> = meters
            .par_iter()
            .filter_map(|m| FeatureExtractor::extract(&m.series).map(|f| (m.meter_id.as_str(), f)))
            .collect();

        if featurized.len() < cfg.min_population {
            tracing::info!(
                qualifying = featurized.len(),
                required = cfg.min_population,
                "too few meters for the outlier model, skipping"
            );
            return Self::default();
        }

        let vectors: Vec<_> = featurized.iter().map(|(_, f)| *f).collect();
        let Some(scaler) = StandardScaler::fit(&vectors) else {
            return Self::default();
        };
        let rows: Vec<Vec<f64>> = vectors.iter().map(|v| scaler.transform(v)).collect();

        let params = IsolationForestParams {
            trees: cfg.trees,
            sample_size: cfg.sample_size,
            seed: cfg.seed,
        };
        let Some(forest) = IsolationForest::fit(&rows, params) else {
            return Self::default();
        };

        let scores: Vec<f64> = rows.par_iter().map(|row| forest.score(row)).collect();
        let Some(threshold) = stats::percentile(&scores, 100.0 * (1.0 - cfg.contamination)) else {
            return Self::default();
        };

        let verdicts: HashMap<String, MlVerdict> = featurized
            .iter()
            .zip(scores)
            .map(|((id, _), score)| {
                (
                    id.to_string(),
                    MlVerdict {
                        anomaly_score: score,
                        threshold,
                        is_outlier: score > threshold,
                    },
                )
            })
            .collect();

        tracing::info!(
            population = verdicts.len(),
            threshold,
            flagged = verdicts.values().filter(|v| v.is_outlier).count(),
            "outlier model scored batch"
        );

        Self { verdicts }
    }

    pub fn get(&self, meter_id: &str) -> Option<&MlVerdict> {
        self.verdicts.get(meter_id)
    }

    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }
}

/// Reports meters the batch model marked as outliers.
#[derive(Debug, Clone, Copy, Default)]
pub struct MlOutlierDetector;

impl Detector for MlOutlierDetector {
    fn kind(&self) -> AnomalyKind {
        AnomalyKind::MlOutlier
    }

    fn detect(&self, meter: &Meter, ctx: &DetectionContext<'_>) -> Vec<AnomalyEvent> {
        match ctx.ml.get(&meter.meter_id) {
            Some(v) if v.is_outlier => vec![AnomalyEvent::MlOutlier {
                anomaly_score: v.anomaly_score,
                threshold: v.threshold,
                severity: if v.anomaly_score.abs() > HIGH_SCORE {
                    Severity::High
                } else {
                    Severity::Medium
                },
            }],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{detectors::test_support::meter, peer_stats::PeerStatistics};

    const PROFILE: [f64; 12] = [
        180.0, 160.0, 120.0, 70.0, 40.0, 20.0, 15.0, 15.0, 30.0, 70.0, 120.0, 170.0,
    ];

    fn normal(i: usize) -> Meter {
        let scale = 1.0 + i as f64 * 0.01;
        let values: Vec<f64> = PROFILE.iter().map(|v| v * scale).collect();
        meter(&format!("n{i:02}"), "b", &values)
    }

    fn odd(id: &str) -> Meter {
        meter(
            id,
            "b",
            &[900.0, 0.0, 0.0, 950.0, 5.0, 0.0, 880.0, 3.0, 0.0, 0.0, 1000.0, 2.0],
        )
    }

    #[test]
    fn small_population_is_skipped() {
        let meters: Vec<Meter> = (0..10).map(normal).collect();
        assert!(MlVerdicts::fit(&meters, &MlConfig::default()).is_empty());
    }

    #[test]
    fn meters_without_enough_positive_readings_are_not_scored() {
        let mut meters: Vec<Meter> = (0..12).map(normal).collect();
        meters.push(meter("sparse", "b", &[0.0, 0.0, 4.0, 0.0, 0.0, 9.0]));
        let verdicts = MlVerdicts::fit(&meters, &MlConfig::default());
        assert_eq!(verdicts.len(), 12);
        assert!(verdicts.get("sparse").is_none());
    }

    #[test]
    fn extreme_meter_is_flagged_in_a_normal_batch() {
        let mut meters: Vec<Meter> = (0..20).map(normal).collect();
        meters.push(odd("x"));
        let verdicts = MlVerdicts::fit(&meters, &MlConfig::default());
        let x = verdicts.get("x").unwrap();
        assert!(x.is_outlier, "{x:?}");

        let peers = PeerStatistics::default();
        let ctx = DetectionContext { peers: &peers, ml: &verdicts };
        let events = MlOutlierDetector.detect(&meters[20], &ctx);
        assert_eq!(events.len(), 1);
        let expected = if x.anomaly_score > HIGH_SCORE {
            Severity::High
        } else {
            Severity::Medium
        };
        assert_eq!(events[0].severity(), expected);
        assert!(MlOutlierDetector.detect(&meters[0], &ctx).is_empty());
    }

    #[test]
    fn severity_splits_at_half() {
        let verdict = |anomaly_score: f64| MlVerdict {
            anomaly_score,
            threshold: 0.45,
            is_outlier: true,
        };
        let ml = MlVerdicts {
            verdicts: HashMap::from([
                ("strong".to_string(), verdict(0.72)),
                ("edge".to_string(), verdict(0.5)),
                ("quiet".to_string(), MlVerdict { is_outlier: false, ..verdict(0.4) }),
            ]),
        };
        let peers = PeerStatistics::default();
        let ctx = DetectionContext { peers: &peers, ml: &ml };
        let severity = |id: &str| -> Vec<Severity> {
            MlOutlierDetector
                .detect(&meter(id, "b", &[1.0]), &ctx)
                .iter()
                .map(AnomalyEvent::severity)
                .collect()
        };
        assert_eq!(severity("strong"), [Severity::High]);
        assert_eq!(severity("edge"), [Severity::Medium]);
        assert!(severity("quiet").is_empty());
        assert!(severity("unscored").is_empty());
    }

    #[test]
    fn verdicts_depend_on_the_batch() {
        // The same meter surrounded by copies of itself ties at the threshold.
        let mut meters: Vec<Meter> = (0..20).map(|i| odd(&format!("x{i:02}"))).collect();
        meters.push(normal(0));
        let verdicts = MlVerdicts::fit(&meters, &MlConfig::default());
        assert_eq!(verdicts.len(), 21);
        assert!(!verdicts.get("x00").unwrap().is_outlier);
    }

    #[test]
    fn fitting_is_deterministic() {
        let mut meters: Vec<Meter> = (0..20).map(normal).collect();
        meters.push(odd("x"));
        let a = MlVerdicts::fit(&meters, &MlConfig::default());
        let b = MlVerdicts::fit(&meters, &MlConfig::default());
        for m in &meters {
            assert_eq!(a.get(&m.meter_id), b.get(&m.meter_id));
        }
    }
}
