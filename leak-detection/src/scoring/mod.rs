//! Fuses a meter's anomaly events into one weighted risk score and tier.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use meter_domain::Meter;
use serde::{Deserialize, Serialize};

use crate::{
    config::{ScoringConfig, SeverityMultipliers, TierThresholds, TypeWeights},
    detectors::{AnomalyEvent, AnomalyKind, Severity},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Normal,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    pub const ALL: [RiskTier; 5] = [
        RiskTier::Critical,
        RiskTier::High,
        RiskTier::Medium,
        RiskTier::Low,
        RiskTier::Normal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Normal => "normal",
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
            RiskTier::Critical => "critical",
        }
    }
}

/// Final assessment of one suspect meter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskScore {
    pub meter_id: String,
    pub building_id: String,
    pub total_score: f64,
    pub tier: RiskTier,
    /// In detection order.
    pub events: Vec<AnomalyEvent>,
}

impl TypeWeights {
    pub fn for_kind(&self, kind: AnomalyKind) -> f64 {
        match kind {
            AnomalyKind::PeerDeviation => self.peer_deviation,
            AnomalyKind::SuddenDrop => self.sudden_drop,
            AnomalyKind::ZeroStreak => self.zero_streak,
            AnomalyKind::TrendChange => self.trend_change,
            AnomalyKind::StatisticalOutlier => self.statistical_outlier,
            AnomalyKind::MlOutlier => self.ml_outlier,
            AnomalyKind::SeasonalPattern => self.seasonal_pattern,
        }
    }
}

impl SeverityMultipliers {
    pub fn for_severity(&self, severity: Severity) -> f64 {
        match severity {
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }
}

impl TierThresholds {
    pub fn tier_for(&self, score: f64) -> RiskTier {
        if score >= self.critical {
            RiskTier::Critical
        } else if score >= self.high {
            RiskTier::High
        } else if score >= self.medium {
            RiskTier::Medium
        } else if score >= self.low {
            RiskTier::Low
        } else {
            RiskTier::Normal
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiskAggregator {
    cfg: ScoringConfig,
}

impl RiskAggregator {
    pub fn new(cfg: ScoringConfig) -> Self {
        Self { cfg }
    }

    pub fn contribution(&self, event: &AnomalyEvent) -> f64 {
        self.cfg.weights.for_kind(event.kind()) * self.cfg.severity.for_severity(event.severity())
    }

    /// `None` for a meter without events; those are not suspects.
    pub fn score(&self, meter: &Meter, events: Vec<AnomalyEvent>) -> Option<RiskScore> {
        if events.is_empty() {
            return None;
        }
        let total_score: f64 = events.iter().map(|e| self.contribution(e)).sum();
        Some(RiskScore {
            meter_id: meter.meter_id.clone(),
            building_id: meter.building_id.clone(),
            total_score,
            tier: self.cfg.tiers.tier_for(total_score),
            events,
        })
    }
}

/// Descending score, ties by ascending meter id.
pub fn rank(scores: &mut [RiskScore]) {
    scores.sort_by(|a, b| {
        b.total_score
            .partial_cmp(&a.total_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.meter_id.cmp(&b.meter_id))
    });
}

/// Suspect counts per tier, for the run summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TierSummary {
    pub counts: BTreeMap<RiskTier, usize>,
    pub suspects: usize,
    pub events: usize,
}

impl TierSummary {
    pub fn from_scores(scores: &[RiskScore]) -> Self {
        let mut counts = BTreeMap::new();
        for s in scores {
            *counts.entry(s.tier).or_insert(0) += 1;
        }
        Self {
            counts,
            suspects: scores.len(),
            events: scores.iter().map(|s| s.events.len()).sum(),
        }
    }

    pub fn count(&self, tier: RiskTier) -> usize {
        self.counts.get(&tier).copied().unwrap_or(0)
    }
}
