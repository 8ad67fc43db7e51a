//! Management steps as written in a field's rotation configuration.
//!
//! A workstep names reference-data records by code. The engine resolves the
//! codes once, when it builds the schedule, and fails early on unknown ones.

use serde::{Deserialize, Serialize};

use crate::date::SimDate;
use crate::ids::{CropId, MineralFertilizerId, OrganicFertilizerId};

/// One dated management step.
///
/// ```yaml
/// - { date: "09-20", type: seed, crop: WW }
/// - { date: "+1:07-31", type: harvest }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkStepConfig {
    /// When the step is due.
    pub date: SimDate,
    /// What the step does.
    #[serde(flatten)]
    pub kind: WorkStepKind,
}

/// The action of a workstep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkStepKind {
    /// Sow a crop.
    Seed {
        /// Crop to sow.
        crop: CropId,
    },
    /// Harvest the crop sown by this process.
    Harvest {
        /// Whether the primary yield leaves the field.
        #[serde(default = "default_true")]
        exported: bool,
    },
    /// Cut part of the above-ground biomass.
    Cutting {
        /// Fraction of above-ground biomass removed, 0 to 1.
        percentage: f64,
        /// Whether the cut biomass leaves the field.
        #[serde(default = "default_true")]
        exported: bool,
    },
    /// Apply mineral fertilizer.
    MineralFertilize {
        /// Fertilizer code.
        fertilizer: MineralFertilizerId,
        /// Nitrogen amount (kg N ha-1).
        amount: f64,
    },
    /// Apply organic fertilizer.
    OrganicFertilize {
        /// Fertilizer code.
        fertilizer: OrganicFertilizerId,
        /// Fresh matter amount (kg FM ha-1).
        amount: f64,
        /// Whether the material is worked into the soil right away.
        #[serde(default)]
        incorporation: bool,
    },
    /// Work the soil.
    Tillage {
        /// Working depth (m).
        #[serde(default = "default_tillage_depth")]
        depth: f64,
    },
    /// Irrigate.
    Irrigate {
        /// Water amount (mm).
        amount: f64,
        /// Nitrate concentration of the water (mg l-1).
        #[serde(default)]
        nitrate_concentration: f64,
    },
    /// Sow a crop on the first day from `date` on that meets the sowing
    /// conditions, and on `latest` at the latest.
    AutomaticSowing {
        /// Crop to sow.
        crop: CropId,
        /// Last day of the sowing window.
        latest: SimDate,
        /// What the window waits for.
        #[serde(default)]
        conditions: SowingConditions,
    },
    /// Harvest the crop of this process once it is mature and the
    /// conditions allow, and on `date` at the latest.
    AutomaticHarvest {
        /// Whether the primary yield leaves the field.
        #[serde(default = "default_true")]
        exported: bool,
        /// What the harvest waits for.
        #[serde(default)]
        conditions: HarvestConditions,
    },
    /// Top the mineral N down to `depth` up to `n_demand`.
    NDemandFertilize {
        /// Fertilizer code.
        fertilizer: MineralFertilizerId,
        /// Mineral N the soil should hold (kg N ha-1).
        n_demand: f64,
        /// Sampling depth (m); the crop's rooting depth if shallower.
        #[serde(default = "default_n_demand_depth")]
        depth: f64,
    },
}

/// Weather and soil an automatic sowing waits for.
///
/// Every condition must hold on the same day. On the latest day of the
/// window the crop is sown regardless.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SowingConditions {
    /// Air temperature threshold (degrees C). Summer crops need the mean
    /// minimum over the window and today's minimum at or above it; winter
    /// crops need the mean daily temperature over the window at or below it.
    #[serde(default)]
    pub min_temperature: f64,
    /// Days in the air temperature window, today included.
    #[serde(default = "default_temperature_window_days")]
    pub temperature_window_days: u32,
    /// Lowest topsoil moisture (% of available soil water).
    #[serde(default)]
    pub min_percent_asw: f64,
    /// Highest topsoil moisture (% of available soil water).
    #[serde(default = "default_max_percent_asw")]
    pub max_percent_asw: f64,
    /// Highest precipitation over the last three days (mm).
    #[serde(default = "no_limit")]
    pub max_3day_precipitation: f64,
    /// Highest precipitation today (mm).
    #[serde(default = "no_limit")]
    pub max_current_day_precipitation: f64,
    /// Temperature sum above `base_temperature` since 1 January needed
    /// (degree days).
    #[serde(default)]
    pub temperature_sum: f64,
    /// Base temperature of `temperature_sum` (degrees C).
    #[serde(default)]
    pub base_temperature: f64,
    /// Optional soil temperature requirement.
    #[serde(default)]
    pub soil_temperature: Option<SoilTemperatureCondition>,
}

impl Default for SowingConditions {
    fn default() -> Self {
        Self {
            min_temperature: 0.0,
            temperature_window_days: default_temperature_window_days(),
            min_percent_asw: 0.0,
            max_percent_asw: default_max_percent_asw(),
            max_3day_precipitation: no_limit(),
            max_current_day_precipitation: no_limit(),
            temperature_sum: 0.0,
            base_temperature: 0.0,
            soil_temperature: None,
        }
    }
}

/// Mean soil temperature an automatic sowing waits for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoilTemperatureCondition {
    /// Depth averaged over (m).
    #[serde(default = "default_soil_temperature_depth")]
    pub depth: f64,
    /// Days averaged over, counted from the opening of the window.
    pub days: u32,
    /// Mean temperature to reach (degrees C).
    pub average: f64,
}

/// When an automatic harvest may fire before its latest date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarvestTime {
    /// At maturity, once soil and weather allow.
    #[default]
    Maturity,
    /// Only on the latest date.
    LatestDate,
}

/// Soil and weather an automatic harvest waits for after maturity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HarvestConditions {
    /// When the harvest may fire.
    #[serde(default)]
    pub harvest_time: HarvestTime,
    /// Lowest topsoil moisture (% of available soil water).
    #[serde(default)]
    pub min_percent_asw: f64,
    /// Highest topsoil moisture (% of available soil water).
    #[serde(default = "no_limit")]
    pub max_percent_asw: f64,
    /// Highest precipitation over the last three days (mm).
    #[serde(default = "no_limit")]
    pub max_3day_precipitation: f64,
    /// Highest precipitation today (mm).
    #[serde(default = "no_limit")]
    pub max_current_day_precipitation: f64,
}

impl Default for HarvestConditions {
    fn default() -> Self {
        Self {
            harvest_time: HarvestTime::default(),
            min_percent_asw: 0.0,
            max_percent_asw: no_limit(),
            max_3day_precipitation: no_limit(),
            max_current_day_precipitation: no_limit(),
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_tillage_depth() -> f64 {
    0.3
}

const fn default_n_demand_depth() -> f64 {
    0.9
}

const fn default_temperature_window_days() -> u32 {
    1
}

const fn default_max_percent_asw() -> f64 {
    100.0
}

const fn default_soil_temperature_depth() -> f64 {
    0.3
}

const fn no_limit() -> f64 {
    9999.0
}

impl WorkStepKind {
    /// Short lowercase name used in log lines.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Seed { .. } => "seed",
            Self::Harvest { .. } => "harvest",
            Self::Cutting { .. } => "cutting",
            Self::MineralFertilize { .. } => "mineral_fertilize",
            Self::OrganicFertilize { .. } => "organic_fertilize",
            Self::Tillage { .. } => "tillage",
            Self::Irrigate { .. } => "irrigate",
            Self::AutomaticSowing { .. } => "automatic_sowing",
            Self::AutomaticHarvest { .. } => "automatic_harvest",
            Self::NDemandFertilize { .. } => "n_demand_fertilize",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_steps_with_defaults() {
        let yaml = r#"
- { date: "09-20", type: seed, crop: WW }
- { date: "+1:03-15", type: mineral_fertilize, fertilizer: CAN, amount: 60 }
- { date: "+1:07-31", type: harvest }
- { date: "+1:08-10", type: tillage }
"#;
        let steps: Vec<WorkStepConfig> = serde_yml::from_str(yaml).unwrap();
        assert_eq!(steps.len(), 4);
        assert_eq!(
            steps[0].kind,
            WorkStepKind::Seed {
                crop: CropId::new("WW")
            }
        );
        assert_eq!(steps[2].kind, WorkStepKind::Harvest { exported: true });
        assert_eq!(steps[3].kind, WorkStepKind::Tillage { depth: 0.3 });
        assert_eq!(steps[1].kind.name(), "mineral_fertilize");
    }

    #[test]
    fn parses_automatic_steps() {
        let yaml = r#"
- date: "04-10"
  type: automatic_sowing
  crop: SM
  latest: "05-20"
  conditions:
    min_temperature: 8
    temperature_window_days: 5
    soil_temperature: { days: 3, average: 10 }
- { date: "10-31", type: automatic_harvest, conditions: { max_3day_precipitation: 5 } }
- { date: "05-15", type: n_demand_fertilize, fertilizer: CAN, n_demand: 160 }
"#;
        let steps: Vec<WorkStepConfig> = serde_yml::from_str(yaml).unwrap();
        let WorkStepKind::AutomaticSowing {
            latest, conditions, ..
        } = &steps[0].kind
        else {
            panic!("expected automatic sowing, got {:?}", steps[0].kind);
        };
        assert_eq!(latest.to_string(), "05-20");
        assert_eq!(conditions.temperature_window_days, 5);
        assert!((conditions.max_percent_asw - 100.0).abs() < f64::EPSILON);
        let soil = conditions.soil_temperature.unwrap();
        assert!((soil.depth - 0.3).abs() < f64::EPSILON);
        assert_eq!(soil.days, 3);

        let WorkStepKind::AutomaticHarvest {
            exported,
            conditions,
        } = &steps[1].kind
        else {
            panic!("expected automatic harvest, got {:?}", steps[1].kind);
        };
        assert!(*exported);
        assert_eq!(conditions.harvest_time, HarvestTime::Maturity);
        assert!((conditions.max_3day_precipitation - 5.0).abs() < f64::EPSILON);

        assert_eq!(
            steps[2].kind,
            WorkStepKind::NDemandFertilize {
                fertilizer: MineralFertilizerId::new("CAN"),
                n_demand: 160.0,
                depth: 0.9,
            }
        );
    }
}
