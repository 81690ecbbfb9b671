use meter_domain::{Meter, Period};

use super::{AnomalyEvent, AnomalyKind, DetectionContext, Detector, Severity};
use crate::config::ZeroStreakConfig;

const HIGH_RUN: usize = 6;

/// Longest run of consecutive months below `low_threshold`, or at exactly 0
/// when the threshold is 0.
///
/// Only the single longest run is reported; on a tie the earliest wins.
#[derive(Debug, Clone)]
pub struct ZeroStreakDetector {
    cfg: ZeroStreakConfig,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Run {
    start: Period,
    end: Period,
    length: usize,
}

impl ZeroStreakDetector {
    pub fn new(cfg: ZeroStreakConfig) -> Self {
        Self { cfg }
    }

    fn counts(&self, value: f64) -> bool {
        value == 0.0 || value < self.cfg.low_threshold
    }

    fn longest_run(&self, meter: &Meter) -> Option<Run> {
        let mut longest: Option<Run> = None;
        let mut current: Option<Run> = None;

        for r in meter.series.iter() {
            if !self.counts(r.value) {
                current = None;
                continue;
            }

            current = match current {
                Some(run) if run.end.succ() == r.period => Some(Run {
                    end: r.period,
                    length: run.length + 1,
                    ..run
                }),
                // A calendar gap starts a new run.
                _ => Some(Run {
                    start: r.period,
                    end: r.period,
                    length: 1,
                }),
            };

            if let Some(run) = current {
                if longest.map_or(true, |l| run.length > l.length) {
                    longest = Some(run);
                }
            }
        }

        longest
    }
}

impl Detector for ZeroStreakDetector {
    fn kind(&self) -> AnomalyKind {
        AnomalyKind::ZeroStreak
    }

    fn detect(&self, meter: &Meter, _ctx: &DetectionContext<'_>) -> Vec<AnomalyEvent> {
        match self.longest_run(meter) {
            Some(run) if run.length >= self.cfg.min_run_length => vec![AnomalyEvent::ZeroStreak {
                start: run.start,
                end: run.end,
                length: run.length,
                severity: if run.length >= HIGH_RUN {
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
    use crate::{
        detectors::{test_support::meter, MlVerdicts},
        peer_stats::PeerStatistics,
    };

    fn detect(cfg: ZeroStreakConfig, values: &[f64]) -> Vec<AnomalyEvent> {
        let peers = PeerStatistics::default();
        let ml = MlVerdicts::default();
        let ctx = DetectionContext { peers: &peers, ml: &ml };
        ZeroStreakDetector::new(cfg).detect(&meter("m", "b", values), &ctx)
    }

    #[test]
    fn reports_only_the_longest_run() {
        let values = [30.0, 0.0, 0.0, 0.0, 40.0, 0.0, 0.0, 0.0, 0.0, 0.0, 10.0];
        let events = detect(ZeroStreakConfig::default(), &values);
        assert_eq!(events.len(), 1);
        match &events[0] {
            AnomalyEvent::ZeroStreak { start, end, length, severity } => {
                assert_eq!(*length, 5);
                assert_eq!(start.to_string(), "2021-06");
                assert_eq!(end.to_string(), "2021-10");
                assert_eq!(*severity, Severity::Medium);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn six_months_is_high() {
        let events = detect(ZeroStreakConfig::default(), &[0.0; 6]);
        assert_eq!(events[0].severity(), Severity::High);
    }

    #[test]
    fn short_runs_are_ignored() {
        assert!(detect(ZeroStreakConfig::default(), &[5.0, 0.0, 0.0, 5.0]).is_empty());
    }

    #[test]
    fn low_consumption_variant_counts_small_values() {
        let cfg = ZeroStreakConfig {
            low_threshold: 2.0,
            ..ZeroStreakConfig::default()
        };
        let events = detect(cfg, &[50.0, 1.0, 0.5, 0.0, 50.0]);
        assert_eq!(events.len(), 1);
        assert!(detect(ZeroStreakConfig::default(), &[50.0, 1.0, 0.5, 0.0, 50.0]).is_empty());
    }

    #[test]
    fn value_equal_to_low_threshold_breaks_the_run() {
        let cfg = ZeroStreakConfig {
            low_threshold: 5.0,
            ..ZeroStreakConfig::default()
        };
        assert!(detect(cfg.clone(), &[50.0, 1.0, 5.0, 1.0, 0.0, 50.0]).is_empty());
        match &detect(cfg, &[50.0, 1.0, 4.9, 1.0, 0.0, 50.0])[..] {
            [AnomalyEvent::ZeroStreak { length, .. }] => assert_eq!(*length, 4),
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[test]
    fn ties_keep_the_first_run() {
        let events = detect(
            ZeroStreakConfig::default(),
            &[0.0, 0.0, 0.0, 9.0, 0.0, 0.0, 0.0],
        );
        match &events[0] {
            AnomalyEvent::ZeroStreak { start, .. } => assert_eq!(start.to_string(), "2021-01"),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
