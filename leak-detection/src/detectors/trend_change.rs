use meter_domain::Meter;

use super::{AnomalyEvent, AnomalyKind, DetectionContext, Detector, Severity};
use crate::{config::TrendConfig, stats};

const HIGH_CHANGE: f64 = 0.8;
const MIN_POSITIVE_PER_WINDOW: usize = 3;
const FLAT_SLOPE: f64 = 1e-9;

/// Change point in the local linear trend.
///
/// At every interior index `i` the OLS slope of `[i-w, i)` is compared with
/// that of `[i, i+w)`. Windows with fewer than three positive readings are
/// not fitted, and a flat "before" slope has no defined relative change.
#[derive(Debug, Clone)]
pub struct TrendChangeDetector {
    cfg: TrendConfig,
}

impl TrendChangeDetector {
    pub fn new(cfg: TrendConfig) -> Self {
        Self { cfg }
    }
}

fn positive_count(window: &[f64]) -> usize {
    window.iter().filter(|v| **v > 0.0).count()
}

impl Detector for TrendChangeDetector {
    fn kind(&self) -> AnomalyKind {
        AnomalyKind::TrendChange
    }

    fn detect(&self, meter: &Meter, _ctx: &DetectionContext<'_>) -> Vec<AnomalyEvent> {
        let w = self.cfg.window;
        let readings = meter.series.readings();
        if readings.len() < 2 * w {
            return Vec::new();
        }
        let values = meter.series.values();

        let mut events = Vec::new();
        for i in w..=(values.len() - w) {
            let before = &values[i - w..i];
            let after = &values[i..i + w];
            if positive_count(before) < MIN_POSITIVE_PER_WINDOW
                || positive_count(after) < MIN_POSITIVE_PER_WINDOW
            {
                continue;
            }

            let (Some(slope_before), Some(slope_after)) = (stats::ols_slope(before), stats::ols_slope(after)) else {
                continue;
            };
            if slope_before.abs() <= FLAT_SLOPE {
                continue;
            }

            let change = (slope_after - slope_before).abs() / slope_before.abs();
            if change > self.cfg.change_threshold {
                events.push(AnomalyEvent::TrendChange {
                    period: readings[i].period,
                    slope_before,
                    slope_after,
                    change_ratio: change,
                    severity: if change > HIGH_CHANGE {
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
        detectors::{test_support::meter, MlVerdicts},
        peer_stats::PeerStatistics,
    };

    fn detect(cfg: TrendConfig, values: &[f64]) -> Vec<AnomalyEvent> {
        let peers = PeerStatistics::default();
        let ml = MlVerdicts::default();
        let ctx = DetectionContext { peers: &peers, ml: &ml };
        TrendChangeDetector::new(cfg).detect(&meter("m", "b", values), &ctx)
    }

    fn small_window() -> TrendConfig {
        TrendConfig {
            window: 3,
            ..TrendConfig::default()
        }
    }

    #[test]
    fn steady_trend_is_quiet() {
        let values: Vec<f64> = (1..=12).map(|v| v as f64 * 10.0).collect();
        assert!(detect(TrendConfig::default(), &values).is_empty());
    }

    #[test]
    fn reversal_is_flagged_at_the_break() {
        // Rising by 10 a month, then falling by 10 a month.
        let values = [10.0, 20.0, 30.0, 40.0, 30.0, 20.0];
        let events = detect(small_window(), &values);
        assert_eq!(events.len(), 1);
        match &events[0] {
            AnomalyEvent::TrendChange { period, slope_before, slope_after, change_ratio, severity } => {
                assert_eq!(period.to_string(), "2021-04");
                assert!((slope_before - 10.0).abs() < 1e-9);
                assert!((slope_after + 10.0).abs() < 1e-9);
                assert!((change_ratio - 2.0).abs() < 1e-9);
                assert_eq!(*severity, Severity::High);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn short_series_is_insufficient() {
        assert!(detect(TrendConfig::default(), &[10.0, 20.0, 30.0, 40.0, 30.0, 20.0]).is_empty());
    }

    #[test]
    fn windows_dominated_by_zeros_are_skipped() {
        let values = [10.0, 20.0, 30.0, 0.0, 0.0, 5.0];
        assert!(detect(small_window(), &values).is_empty());
    }

    #[test]
    fn flat_before_slope_is_skipped() {
        let values = [50.0, 50.0, 50.0, 10.0, 40.0, 90.0];
        assert!(detect(small_window(), &values).is_empty());
    }
}
