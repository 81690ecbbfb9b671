use meter_domain::Meter;

use super::{AnomalyEvent, AnomalyKind, DetectionContext, Detector, Severity};
use crate::config::SuddenDropConfig;

const HIGH_DROP: f64 = 0.8;

/// Month-over-month collapse in consumption.
///
/// Only calendar-adjacent readings are compared; a gap in the series is
/// never bridged.
#[derive(Debug, Clone)]
pub struct SuddenDropDetector {
    cfg: SuddenDropConfig,
}

impl SuddenDropDetector {
    pub fn new(cfg: SuddenDropConfig) -> Self {
        Self { cfg }
    }
}

impl Detector for SuddenDropDetector {
    fn kind(&self) -> AnomalyKind {
        AnomalyKind::SuddenDrop
    }

    fn detect(&self, meter: &Meter, _ctx: &DetectionContext<'_>) -> Vec<AnomalyEvent> {
        let mut events = Vec::new();
        for pair in meter.series.readings().windows(2) {
            let (prev, curr) = (pair[0], pair[1]);
            if prev.period.succ() != curr.period || prev.value <= self.cfg.min_baseline {
                continue;
            }
            if self.cfg.skip_zero_current && curr.value <= 0.0 {
                continue;
            }

            let ratio = (prev.value - curr.value) / prev.value;
            if ratio >= self.cfg.drop_threshold {
                events.push(AnomalyEvent::SuddenDrop {
                    previous_period: prev.period,
                    period: curr.period,
                    previous_value: prev.value,
                    value: curr.value,
                    drop_ratio: ratio,
                    severity: if ratio > HIGH_DROP {
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
