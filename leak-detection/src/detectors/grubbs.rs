use meter_domain::Meter;
use statrs::distribution::{ContinuousCDF, StudentsT};

use super::{AnomalyEvent, AnomalyKind, DetectionContext, Detector, Severity};
use crate::{config::GrubbsConfig, stats};

const MIN_SAMPLE: usize = 3;

/// Two-sided Grubbs critical value for a sample of `n` at significance `alpha`.
pub fn grubbs_critical(n: usize, alpha: f64) -> Option<f64> {
    if n < MIN_SAMPLE {
        return None;
    }
    let nf = n as f64;
    let t_dist = StudentsT::new(0.0, 1.0, nf - 2.0).ok()?;
    let t = t_dist.inverse_cdf(1.0 - alpha / (2.0 * nf));
    let t2 = t * t;
    Some(((nf - 1.0) / nf.sqrt()) * (t2 / (nf - 2.0 + t2)).sqrt())
}

/// Iterative Grubbs test over the strictly positive values.
///
/// Removes the most extreme point while it is significant and at least
/// three points remain. Returns the removed values in removal order.
pub fn grubbs_outliers(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut data: Vec<f64> = values.iter().copied().filter(|v| *v > 0.0).collect();
    let mut removed = Vec::new();

    while data.len() >= MIN_SAMPLE {
        let (Some(mean), Some(std)) = (stats::mean(&data), stats::population_std(&data)) else {
            break;
        };
        if std <= f64::EPSILON {
            break;
        }

        let mut max_idx = 0;
        let mut max_dev = 0.0;
        for (i, v) in data.iter().enumerate() {
            let dev = (v - mean).abs();
            if dev > max_dev {
                max_dev = dev;
                max_idx = i;
            }
        }

        let Some(critical) = grubbs_critical(data.len(), alpha) else {
            break;
        };
        if max_dev / std > critical {
            removed.push(data.remove(max_idx));
        } else {
            break;
        }
    }

    removed
}

#[derive(Debug, Clone)]
pub struct StatisticalOutlierDetector {
    cfg: GrubbsConfig,
}

impl StatisticalOutlierDetector {
    pub fn new(cfg: GrubbsConfig) -> Self {
        Self { cfg }
    }
}

impl Detector for StatisticalOutlierDetector {
    fn kind(&self) -> AnomalyKind {
        AnomalyKind::StatisticalOutlier
    }

    fn detect(&self, meter: &Meter, _ctx: &DetectionContext<'_>) -> Vec<AnomalyEvent> {
        let outliers = grubbs_outliers(&meter.series.values(), self.cfg.alpha);
        if outliers.is_empty() {
            return Vec::new();
        }
        vec![AnomalyEvent::StatisticalOutlier {
            outliers,
            severity: Severity::Medium,
        }]
    }
}
