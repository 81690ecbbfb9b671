use meter_domain::{Meter, Season};
use serde::{Deserialize, Serialize};

use super::{AnomalyEvent, AnomalyKind, DetectionContext, Detector, Severity};
use crate::{config::SeasonalConfig, stats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalReason {
    /// Heating season draw is positive but implausibly small.
    WinterUnderuse,
    /// Winter and summer are nearly the same.
    NoSeasonalContrast,
    /// Summer draw exceeds winter draw.
    InvertedSeason,
}

impl SeasonalReason {
    fn severity(&self) -> Severity {
        match self {
            SeasonalReason::WinterUnderuse => Severity::Medium,
            SeasonalReason::NoSeasonalContrast => Severity::Low,
            SeasonalReason::InvertedSeason => Severity::High,
        }
    }
}

/// Heating-gas seasonality checks on the winter and summer means of
/// positive readings. Each failed check is its own event.
#[derive(Debug, Clone)]
pub struct SeasonalPatternDetector {
    cfg: SeasonalConfig,
}

impl SeasonalPatternDetector {
    pub fn new(cfg: SeasonalConfig) -> Self {
        Self { cfg }
    }
}

fn positive_mean(meter: &Meter, season: Season) -> Option<f64> {
    let values: Vec<f64> = meter
        .series
        .iter()
        .filter(|r| r.value > 0.0 && r.period.season() == season)
        .map(|r| r.value)
        .collect();
    stats::mean(&values)
}

impl Detector for SeasonalPatternDetector {
    fn kind(&self) -> AnomalyKind {
        AnomalyKind::SeasonalPattern
    }

    fn detect(&self, meter: &Meter, _ctx: &DetectionContext<'_>) -> Vec<AnomalyEvent> {
        let winter = positive_mean(meter, Season::Winter);
        let summer = positive_mean(meter, Season::Summer);

        let mut reasons = Vec::new();
        if let Some(w) = winter {
            if w < self.cfg.winter_floor {
                reasons.push(SeasonalReason::WinterUnderuse);
            }
        }
        if let (Some(w), Some(s)) = (winter, summer) {
            if (w - s).abs() < self.cfg.flatness_floor {
                reasons.push(SeasonalReason::NoSeasonalContrast);
            }
            if s > w {
                reasons.push(SeasonalReason::InvertedSeason);
            }
        }

        reasons
            .into_iter()
            .map(|reason| AnomalyEvent::SeasonalPattern {
                reason,
                winter_mean: winter,
                summer_mean: summer,
                severity: reason.severity(),
            })
            .collect()
    }
}
