use meter_domain::Meter;

use super::{AnomalyEvent, AnomalyKind, DetectionContext, Detector, Severity};
use crate::config::PeerConfig;

const HIGH_Z: f64 = 3.0;

/// Flags months where a meter sits far from its building's draw for the
/// same billing period.
#[derive(Debug, Clone)]
pub struct PeerDeviationDetector {
    cfg: PeerConfig,
}

impl PeerDeviationDetector {
    pub fn new(cfg: PeerConfig) -> Self {
        Self { cfg }
    }
}

impl Detector for PeerDeviationDetector {
    fn kind(&self) -> AnomalyKind {
        AnomalyKind::PeerDeviation
    }

    fn detect(&self, meter: &Meter, ctx: &DetectionContext<'_>) -> Vec<AnomalyEvent> {
        let mut events = Vec::new();
        for r in meter.series.iter() {
            let Some(stat) = ctx.peers.get(&meter.building_id, r.period) else {
                continue;
            };
            let z = (r.value - stat.mean) / stat.std;
            if z.abs() > self.cfg.z_threshold {
                events.push(AnomalyEvent::PeerDeviation {
                    period: r.period,
                    value: r.value,
                    peer_mean: stat.mean,
                    peer_std: stat.std,
                    z_score: z,
                    severity: if z.abs() > HIGH_Z {
                        Severity::High
                    } else {
                        Severity::Medium
                    },
                });
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ScoringConfig,
        detectors::{test_support::meter, MlVerdicts},
        peer_stats::PeerStatistics,
        scoring::RiskAggregator,
    };

    fn building() -> Vec<Meter> {
        vec![
            meter("m1", "b1", &[100.0]),
            meter("m2", "b1", &[100.0]),
            meter("m3", "b1", &[100.0]),
            meter("m4", "b1", &[100.0]),
            meter("m5", "b1", &[10.0]),
        ]
    }

    fn run(threshold: f64) -> Vec<Vec<AnomalyEvent>> {
        let meters = building();
        let cfg = PeerConfig {
            z_threshold: threshold,
            ..PeerConfig::default()
        };
        let peers = PeerStatistics::compute(&meters, &cfg);
        let ml = MlVerdicts::default();
        let ctx = DetectionContext { peers: &peers, ml: &ml };
        let detector = PeerDeviationDetector::new(cfg);
        meters.iter().map(|m| detector.detect(m, &ctx)).collect()
    }

    #[test]
    fn z_of_minus_two_fires_at_1_8() {
        let events = run(1.8);
        assert!(events[..4].iter().all(Vec::is_empty));
        assert_eq!(events[4].len(), 1);
        match &events[4][0] {
            AnomalyEvent::PeerDeviation { z_score, severity, peer_mean, peer_std, .. } => {
                assert_eq!(*z_score, -2.0);
                assert_eq!(*peer_mean, 82.0);
                assert_eq!(*peer_std, 36.0);
                assert_eq!(*severity, Severity::Medium);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn z_of_minus_two_is_quiet_at_2_5() {
        assert!(run(2.5).iter().all(Vec::is_empty));
    }

    #[test]
    fn beyond_three_sigma_is_high() {
        // Ten meters at 100 and one at 0: z = -sqrt(10).
        let mut meters: Vec<Meter> = (0..10).map(|i| meter(&format!("m{i}"), "b1", &[100.0])).collect();
        meters.push(meter("dark", "b1", &[0.0]));
        let cfg = PeerConfig::default();
        let peers = PeerStatistics::compute(&meters, &cfg);
        let ml = MlVerdicts::default();
        let ctx = DetectionContext { peers: &peers, ml: &ml };

        let events = PeerDeviationDetector::new(cfg).detect(&meters[10], &ctx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            AnomalyEvent::PeerDeviation { z_score, severity, .. } => {
                assert!((*z_score + 10f64.sqrt()).abs() < 1e-9);
                assert_eq!(*severity, Severity::High);
            }
            other => panic!("unexpected event {other:?}"),
        }
        let agg = RiskAggregator::new(ScoringConfig::default());
        assert_eq!(agg.contribution(&events[0]), 52.5);
    }

    #[test]
    fn no_peer_stats_means_no_events() {
        let meters = building();
        let peers = PeerStatistics::default();
        let ml = MlVerdicts::default();
        let ctx = DetectionContext { peers: &peers, ml: &ml };
        let detector = PeerDeviationDetector::new(PeerConfig::default());
        assert!(detector.detect(&meters[4], &ctx).is_empty());
    }
}
