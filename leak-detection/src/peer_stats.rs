use std::collections::{BTreeMap, HashMap};

use meter_domain::{Meter, Period};

use crate::{config::PeerConfig, stats};

/// Cross-meter mean and deviation of one building at one billing period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeerStat {
    pub mean: f64,
    pub std: f64,
    /// Meters that reported a value at this period.
    pub reporting: usize,
}

/// Peer statistics for every `(building, period)` cell that is informative.
///
/// A cell exists only when at least `min_peers` meters report at that
/// period, the deviation is non-zero, and the mean reaches `min_baseline`.
/// Meters without a reading at a period are left out of that cell.
#[derive(Debug, Clone, Default)]
pub struct PeerStatistics {
    cells: HashMap<String, BTreeMap<Period, PeerStat>>,
}

impl PeerStatistics {
    pub fn compute(meters: &[Meter], cfg: &PeerConfig) -> Self {
        let mut by_building: HashMap<&str, Vec<&Meter>> = HashMap::new();
        for m in meters {
            by_building.entry(m.building_id.as_str()).or_default().push(m);
        }

        let mut cells = HashMap::new();
        for (building_id, members) in by_building {
            if members.len() < cfg.min_peers {
                continue;
            }

            let mut per_period: BTreeMap<Period, Vec<f64>> = BTreeMap::new();
            for m in &members {
                for r in m.series.iter() {
                    per_period.entry(r.period).or_default().push(r.value);
                }
            }

            let mut building_cells = BTreeMap::new();
            for (period, values) in per_period {
                if values.len() < cfg.min_peers {
                    continue;
                }
                let (Some(mean), Some(std)) = (stats::mean(&values), stats::population_std(&values)) else {
                    continue;
                };
                if std <= f64::EPSILON || mean < cfg.min_baseline {
                    continue;
                }
                building_cells.insert(
                    period,
                    PeerStat {
                        mean,
                        std,
                        reporting: values.len(),
                    },
                );
            }

            if !building_cells.is_empty() {
                cells.insert(building_id.to_string(), building_cells);
            }
        }

        Self { cells }
    }

    pub fn get(&self, building_id: &str, period: Period) -> Option<&PeerStat> {
        self.cells.get(building_id)?.get(&period)
    }

    /// Number of `(building, period)` cells with statistics.
    pub fn len(&self) -> usize {
        self.cells.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn buildings(&self) -> usize {
        self.cells.len()
    }
}
