use std::collections::HashSet;
use std::time::Instant;

use meter_domain::Meter;
use rayon::prelude::*;

use crate::{
    config::{ConfigError, DetectionConfig},
    detectors::{DetectionContext, DetectorSet, MlVerdicts},
    peer_stats::PeerStatistics,
    scoring::{self, RiskAggregator, RiskScore},
};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("meter id '{0}' appears more than once in the batch")]
    DuplicateMeter(String),
}

/// One configured batch run: peer statistics, then the outlier model, then
/// the per-meter detectors and aggregation, then ranking.
pub struct Pipeline {
    cfg: DetectionConfig,
    detectors: DetectorSet,
    aggregator: RiskAggregator,
}

impl Pipeline {
    /// Fails before any work is done if a tunable is out of range.
    pub fn new(cfg: DetectionConfig) -> Result<Self, AnalysisError> {
        cfg.validate()?;
        let detectors = DetectorSet::from_config(&cfg);
        let enabled: Vec<&str> = detectors.kinds().iter().map(|k| k.as_str()).collect();
        tracing::debug!(detectors = ?enabled, "detectors enabled");
        Ok(Self {
            detectors,
            aggregator: RiskAggregator::new(cfg.scoring.clone()),
            cfg,
        })
    }

    pub fn run(&self, meters: &[Meter]) -> Result<Vec<RiskScore>, AnalysisError> {
        let started = Instant::now();

        let mut seen = HashSet::with_capacity(meters.len());
        for m in meters {
            if !seen.insert(m.meter_id.as_str()) {
                return Err(AnalysisError::DuplicateMeter(m.meter_id.clone()));
            }
        }

        let peers = if self.cfg.peer.enabled {
            PeerStatistics::compute(meters, &self.cfg.peer)
        } else {
            PeerStatistics::default()
        };
        let ml = if self.cfg.ml.enabled {
            MlVerdicts::fit(meters, &self.cfg.ml)
        } else {
            MlVerdicts::default()
        };
        tracing::info!(
            meters = meters.len(),
            buildings = peers.buildings(),
            peer_cells = peers.len(),
            ml_population = ml.len(),
            "batch prepared"
        );

        let ctx = DetectionContext { peers: &peers, ml: &ml };
        let mut scores: Vec<RiskScore> = meters
            .par_iter()
            .filter_map(|m| self.aggregator.score(m, self.detectors.run(m, &ctx)))
            .collect();
        scoring::rank(&mut scores);

        metrics::counter!("leak_detection_meters_total").increment(meters.len() as u64);
        for s in &scores {
            metrics::counter!("leak_detection_suspects_total", "tier" => s.tier.as_str()).increment(1);
            for e in &s.events {
                metrics::counter!("leak_detection_events_total", "kind" => e.kind().as_str()).increment(1);
            }
        }
        let elapsed = started.elapsed();
        metrics::histogram!("leak_detection_run_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            suspects = scores.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "analysis complete"
        );
        Ok(scores)
    }
}

/// Analyze a batch of meters and return the suspects, highest risk first.
pub fn analyze(meters: &[Meter], cfg: &DetectionConfig) -> Result<Vec<RiskScore>, AnalysisError> {
    Pipeline::new(cfg.clone())?.run(meters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::meter;

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut cfg = DetectionConfig::default();
        cfg.grubbs.alpha = 1.5;
        let err = analyze(&[meter("m", "b", &[1.0])], &cfg).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Config(ConfigError::OutOfRange { field: "grubbs.alpha", .. })
        ));
    }

    #[test]
    fn duplicate_meter_ids_are_rejected() {
        let meters = [meter("m", "b", &[1.0]), meter("m", "c", &[2.0])];
        assert_eq!(
            analyze(&meters, &DetectionConfig::default()).unwrap_err(),
            AnalysisError::DuplicateMeter("m".into())
        );
    }

    #[test]
    fn quiet_batch_has_no_suspects() {
        // Eleven months: too short for the trend windows.
        let values = [
            180.0, 160.0, 120.0, 70.0, 40.0, 20.0, 15.0, 15.0, 30.0, 70.0, 120.0,
        ];
        let meters = [meter("a", "b", &values)];
        assert!(analyze(&meters, &DetectionConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn empty_batch_is_fine() {
        assert!(analyze(&[], &DetectionConfig::default()).unwrap().is_empty());
    }
}
