//! The seven independent detectors and the event type they produce.
//!
//! Every detector is a pure function of one meter's series plus the two
//! batch-level inputs in [`DetectionContext`]. Detectors that lack data for
//! a meter return no events; they never fail.

pub mod grubbs;
pub mod ml_outlier;
pub mod peer_deviation;
pub mod seasonal;
pub mod sudden_drop;
pub mod trend_change;
pub mod zero_streak;

use meter_domain::{Meter, Period};
use serde::{Deserialize, Serialize};

use crate::{config::DetectionConfig, peer_stats::PeerStatistics};

pub use grubbs::StatisticalOutlierDetector;
pub use ml_outlier::{MlOutlierDetector, MlVerdict, MlVerdicts};
pub use peer_deviation::PeerDeviationDetector;
pub use seasonal::{SeasonalPatternDetector, SeasonalReason};
pub use sudden_drop::SuddenDropDetector;
pub use trend_change::TrendChangeDetector;
pub use zero_streak::ZeroStreakDetector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    PeerDeviation,
    SuddenDrop,
    ZeroStreak,
    TrendChange,
    SeasonalPattern,
    StatisticalOutlier,
    MlOutlier,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::PeerDeviation => "peer_deviation",
            AnomalyKind::SuddenDrop => "sudden_drop",
            AnomalyKind::ZeroStreak => "zero_streak",
            AnomalyKind::TrendChange => "trend_change",
            AnomalyKind::SeasonalPattern => "seasonal_pattern",
            AnomalyKind::StatisticalOutlier => "statistical_outlier",
            AnomalyKind::MlOutlier => "ml_outlier",
        }
    }
}

/// One finding of one detector, with the evidence that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnomalyEvent {
    PeerDeviation {
        period: Period,
        value: f64,
        peer_mean: f64,
        peer_std: f64,
        z_score: f64,
        severity: Severity,
    },
    SuddenDrop {
        previous_period: Period,
        period: Period,
        previous_value: f64,
        value: f64,
        drop_ratio: f64,
        severity: Severity,
    },
    ZeroStreak {
        start: Period,
        end: Period,
        length: usize,
        severity: Severity,
    },
    TrendChange {
        period: Period,
        slope_before: f64,
        slope_after: f64,
        change_ratio: f64,
        severity: Severity,
    },
    SeasonalPattern {
        reason: SeasonalReason,
        winter_mean: Option<f64>,
        summer_mean: Option<f64>,
        severity: Severity,
    },
    StatisticalOutlier {
        outliers: Vec<f64>,
        severity: Severity,
    },
    MlOutlier {
        anomaly_score: f64,
        threshold: f64,
        severity: Severity,
    },
}

impl AnomalyEvent {
    pub fn kind(&self) -> AnomalyKind {
        match self {
            AnomalyEvent::PeerDeviation { .. } => AnomalyKind::PeerDeviation,
            AnomalyEvent::SuddenDrop { .. } => AnomalyKind::SuddenDrop,
            AnomalyEvent::ZeroStreak { .. } => AnomalyKind::ZeroStreak,
            AnomalyEvent::TrendChange { .. } => AnomalyKind::TrendChange,
            AnomalyEvent::SeasonalPattern { .. } => AnomalyKind::SeasonalPattern,
            AnomalyEvent::StatisticalOutlier { .. } => AnomalyKind::StatisticalOutlier,
            AnomalyEvent::MlOutlier { .. } => AnomalyKind::MlOutlier,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            AnomalyEvent::PeerDeviation { severity, .. }
            | AnomalyEvent::SuddenDrop { severity, .. }
            | AnomalyEvent::ZeroStreak { severity, .. }
            | AnomalyEvent::TrendChange { severity, .. }
            | AnomalyEvent::SeasonalPattern { severity, .. }
            | AnomalyEvent::StatisticalOutlier { severity, .. }
            | AnomalyEvent::MlOutlier { severity, .. } => *severity,
        }
    }
}

/// Batch-level inputs computed before any per-meter detector runs.
#[derive(Debug, Clone, Copy)]
pub struct DetectionContext<'a> {
    pub peers: &'a PeerStatistics,
    pub ml: &'a MlVerdicts,
}

pub trait Detector: Send + Sync {
    fn kind(&self) -> AnomalyKind;

    fn detect(&self, meter: &Meter, ctx: &DetectionContext<'_>) -> Vec<AnomalyEvent>;
}

/// The enabled detectors, in the fixed order their events are reported.
pub struct DetectorSet {
    detectors: Vec<Box<dyn Detector>>,
}

impl DetectorSet {
    pub fn from_config(cfg: &DetectionConfig) -> Self {
        let mut detectors: Vec<Box<dyn Detector>> = Vec::with_capacity(7);

        if cfg.peer.enabled {
            detectors.push(Box::new(PeerDeviationDetector::new(cfg.peer.clone())));
        }
        if cfg.sudden_drop.enabled {
            detectors.push(Box::new(SuddenDropDetector::new(cfg.sudden_drop.clone())));
        }
        if cfg.zero_streak.enabled {
            detectors.push(Box::new(ZeroStreakDetector::new(cfg.zero_streak.clone())));
        }
        if cfg.trend.enabled {
            detectors.push(Box::new(TrendChangeDetector::new(cfg.trend.clone())));
        }
        if cfg.seasonal.enabled {
            detectors.push(Box::new(SeasonalPatternDetector::new(cfg.seasonal.clone())));
        }
        if cfg.grubbs.enabled {
            detectors.push(Box::new(StatisticalOutlierDetector::new(cfg.grubbs.clone())));
        }
        if cfg.ml.enabled {
            detectors.push(Box::new(MlOutlierDetector));
        }

        Self { detectors }
    }

    pub fn kinds(&self) -> Vec<AnomalyKind> {
        self.detectors.iter().map(|d| d.kind()).collect()
    }

    pub fn run(&self, meter: &Meter, ctx: &DetectionContext<'_>) -> Vec<AnomalyEvent> {
        let mut events = Vec::new();
        for detector in &self.detectors {
            let found = detector.detect(meter, ctx);
            if !found.is_empty() {
                tracing::debug!(
                    meter_id = %meter.meter_id,
                    detector = detector.kind().as_str(),
                    events = found.len(),
                    "detector fired"
                );
            }
            events.extend(found);
        }
        events
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use meter_domain::{ConsumptionSeries, Meter, Period, Reading};
    use time::Month;

    /// Monthly series starting January 2021.
    pub fn series(values: &[f64]) -> ConsumptionSeries {
        series_from(Period::new(2021, Month::January), values)
    }

    pub fn series_from(start: Period, values: &[f64]) -> ConsumptionSeries {
        let mut period = start;
        let mut readings = Vec::with_capacity(values.len());
        for v in values {
            readings.push(Reading::new(period, *v));
            period = period.succ();
        }
        ConsumptionSeries::new(readings).expect("valid test series")
    }

    pub fn meter(id: &str, building: &str, values: &[f64]) -> Meter {
        Meter::new(id, building, series(values))
    }
}
