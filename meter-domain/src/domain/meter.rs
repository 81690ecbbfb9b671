use serde::{Deserialize, Serialize};

use super::series::ConsumptionSeries;

/// A billed service connection and its monthly history.
///
/// Buildings are not materialized; meters sharing `building_id` form the
/// peer group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meter {
    pub meter_id: String,
    pub building_id: String,
    pub series: ConsumptionSeries,
}

impl Meter {
    pub fn new(
        meter_id: impl Into<String>,
        building_id: impl Into<String>,
        series: ConsumptionSeries,
    ) -> Self {
        Self {
            meter_id: meter_id.into(),
            building_id: building_id.into(),
            series,
        }
    }
}
