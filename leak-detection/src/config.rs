use serde::Deserialize;
use std::{fs, path::Path};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputConfig {
    /// Long-format consumption CSV. The CLI argument takes precedence.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// NDJSON destination; stdout when unset.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub textfile_path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub metrics: Option<MetricsConfig>,
    #[serde(default)]
    pub detection: DetectionConfig,
}

const DEFAULT_CONFIG_PATH: &str = "leak-detection.toml";

impl AppConfig {
    /// Load from `LEAK_DETECTION_CONFIG`, falling back to `leak-detection.toml`.
    ///
    /// An explicitly named file must exist; the fallback file is optional and
    /// its absence means "all defaults".
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let cfg = match env::var("LEAK_DETECTION_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(DEFAULT_CONFIG_PATH)?
            }
            Err(_) => Self::default(),
        };
        cfg.detection.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config '{path}': {e}"))?;
        let cfg: AppConfig = toml::from_str(&contents)?;
        Ok(cfg)
    }
}

/// Every tunable of the detection engine. Unset sections and fields fall
/// back to their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub peer: PeerConfig,
    pub sudden_drop: SuddenDropConfig,
    pub zero_streak: ZeroStreakConfig,
    pub trend: TrendConfig,
    pub seasonal: SeasonalConfig,
    pub grubbs: GrubbsConfig,
    pub ml: MlConfig,
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    pub enabled: bool,
    /// Buildings with fewer meters get no peer statistics.
    pub min_peers: usize,
    pub z_threshold: f64,
    /// Peer means below this are too small to compare against.
    pub min_baseline: f64,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_peers: 3,
            z_threshold: 2.0,
            min_baseline: 5.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SuddenDropConfig {
    pub enabled: bool,
    /// Fractional drop `(prev - curr) / prev` that qualifies, inclusive.
    pub drop_threshold: f64,
    /// The previous month must exceed this.
    pub min_baseline: f64,
    /// Only count drops into months that still show some consumption.
    pub skip_zero_current: bool,
}

impl Default for SuddenDropConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            drop_threshold: 0.6,
            min_baseline: 10.0,
            skip_zero_current: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ZeroStreakConfig {
    pub enabled: bool,
    /// Values strictly below this count toward a streak, as do exact zeros.
    /// `0.0` means strict zeros.
    pub low_threshold: f64,
    pub min_run_length: usize,
}

impl Default for ZeroStreakConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            low_threshold: 0.0,
            min_run_length: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    pub enabled: bool,
    pub window: usize,
    pub change_threshold: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window: 6,
            change_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SeasonalConfig {
    pub enabled: bool,
    pub winter_floor: f64,
    pub flatness_floor: f64,
}

impl Default for SeasonalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            winter_floor: 30.0,
            flatness_floor: 10.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GrubbsConfig {
    pub enabled: bool,
    pub alpha: f64,
}

impl Default for GrubbsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            alpha: 0.05,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MlConfig {
    pub enabled: bool,
    /// Expected anomalous fraction of the population.
    pub contamination: f64,
    /// The model is skipped when fewer meters qualify.
    pub min_population: usize,
    pub trees: usize,
    pub sample_size: usize,
    pub seed: u64,
}

impl Default for MlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            contamination: 0.05,
            min_population: 11,
            trees: 100,
            sample_size: 256,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: TypeWeights,
    pub severity: SeverityMultipliers,
    pub tiers: TierThresholds,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TypeWeights {
    pub peer_deviation: f64,
    pub sudden_drop: f64,
    pub zero_streak: f64,
    pub trend_change: f64,
    pub statistical_outlier: f64,
    pub ml_outlier: f64,
    pub seasonal_pattern: f64,
}

impl Default for TypeWeights {
    fn default() -> Self {
        Self {
            peer_deviation: 35.0,
            sudden_drop: 30.0,
            zero_streak: 25.0,
            trend_change: 20.0,
            statistical_outlier: 15.0,
            ml_outlier: 40.0,
            seasonal_pattern: 20.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SeverityMultipliers {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for SeverityMultipliers {
    fn default() -> Self {
        Self {
            high: 1.5,
            medium: 1.0,
            low: 0.5,
        }
    }
}

/// Lower bounds (inclusive) of each tier.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            critical: 150.0,
            high: 100.0,
            medium: 80.0,
            low: 50.0,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} = {value} is out of range (expected {expected})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },
    #[error("tier thresholds must satisfy critical >= high >= medium >= low")]
    TierOrder,
}

fn check(field: &'static str, value: f64, ok: bool, expected: &'static str) -> Result<(), ConfigError> {
    if ok && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            expected,
        })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    check(field, value, value >= 0.0, ">= 0")
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    check(field, value, value > 0.0, "> 0")
}

impl DetectionConfig {
    /// Reject out-of-range tunables before any detector runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.peer;
        check("peer.min_peers", p.min_peers as f64, p.min_peers >= 2, ">= 2")?;
        positive("peer.z_threshold", p.z_threshold)?;
        non_negative("peer.min_baseline", p.min_baseline)?;

        let d = &self.sudden_drop;
        check(
            "sudden_drop.drop_threshold",
            d.drop_threshold,
            d.drop_threshold > 0.0 && d.drop_threshold <= 1.0,
            "in (0, 1]",
        )?;
        non_negative("sudden_drop.min_baseline", d.min_baseline)?;

        let z = &self.zero_streak;
        non_negative("zero_streak.low_threshold", z.low_threshold)?;
        check(
            "zero_streak.min_run_length",
            z.min_run_length as f64,
            z.min_run_length >= 1,
            ">= 1",
        )?;

        let t = &self.trend;
        check("trend.window", t.window as f64, t.window >= 3, ">= 3")?;
        positive("trend.change_threshold", t.change_threshold)?;

        non_negative("seasonal.winter_floor", self.seasonal.winter_floor)?;
        non_negative("seasonal.flatness_floor", self.seasonal.flatness_floor)?;

        let a = self.grubbs.alpha;
        check("grubbs.alpha", a, a > 0.0 && a < 1.0, "in (0, 1)")?;

        let m = &self.ml;
        check(
            "ml.contamination",
            m.contamination,
            m.contamination > 0.0 && m.contamination <= 0.5,
            "in (0, 0.5]",
        )?;
        check("ml.min_population", m.min_population as f64, m.min_population >= 3, ">= 3")?;
        check("ml.trees", m.trees as f64, m.trees >= 1, ">= 1")?;
        check("ml.sample_size", m.sample_size as f64, m.sample_size >= 2, ">= 2")?;

        let w = &self.scoring.weights;
        non_negative("scoring.weights.peer_deviation", w.peer_deviation)?;
        non_negative("scoring.weights.sudden_drop", w.sudden_drop)?;
        non_negative("scoring.weights.zero_streak", w.zero_streak)?;
        non_negative("scoring.weights.trend_change", w.trend_change)?;
        non_negative("scoring.weights.statistical_outlier", w.statistical_outlier)?;
        non_negative("scoring.weights.ml_outlier", w.ml_outlier)?;
        non_negative("scoring.weights.seasonal_pattern", w.seasonal_pattern)?;

        let s = &self.scoring.severity;
        non_negative("scoring.severity.high", s.high)?;
        non_negative("scoring.severity.medium", s.medium)?;
        non_negative("scoring.severity.low", s.low)?;

        let tiers = &self.scoring.tiers;
        non_negative("scoring.tiers.critical", tiers.critical)?;
        non_negative("scoring.tiers.high", tiers.high)?;
        non_negative("scoring.tiers.medium", tiers.medium)?;
        non_negative("scoring.tiers.low", tiers.low)?;
        if !(tiers.critical >= tiers.high && tiers.high >= tiers.medium && tiers.medium >= tiers.low) {
            return Err(ConfigError::TierOrder);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(DetectionConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [detection.peer]
            z_threshold = 1.8

            [detection.scoring.weights]
            ml_outlier = 10.0
            "#,
        )
        .unwrap();

        assert_eq!(cfg.detection.peer.z_threshold, 1.8);
        assert_eq!(cfg.detection.peer.min_peers, 3);
        assert_eq!(cfg.detection.scoring.weights.ml_outlier, 10.0);
        assert_eq!(cfg.detection.scoring.weights.peer_deviation, 35.0);
        assert_eq!(cfg.detection.trend.window, 6);
        assert!(cfg.metrics.is_none());
        assert!(cfg.output.path.is_none());
    }

    #[test]
    fn rejects_negative_threshold() {
        let mut cfg = DetectionConfig::default();
        cfg.sudden_drop.min_baseline = -1.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::OutOfRange {
                field: "sudden_drop.min_baseline",
                ..
            })
        ));
    }

    #[test]
    fn rejects_contamination_and_alpha_out_of_range() {
        let mut cfg = DetectionConfig::default();
        cfg.ml.contamination = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = DetectionConfig::default();
        cfg.grubbs.alpha = 1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_unordered_tiers() {
        let mut cfg = DetectionConfig::default();
        cfg.scoring.tiers.low = 120.0;
        assert_eq!(cfg.validate(), Err(ConfigError::TierOrder));
    }

    #[test]
    fn rejects_nan() {
        let mut cfg = DetectionConfig::default();
        cfg.peer.z_threshold = f64::NAN;
        assert!(cfg.validate().is_err());
    }
}
