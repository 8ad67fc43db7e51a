//! Resolved management operations.
//!
//! [`Operation`] is the closed set of things a schedule can do to a field.
//! Reference-data codes from the configuration are looked up once, when the
//! operation is built, so dispatch never fails on an unknown code.

use furrow_types::{
    CropId, CropParameters, HarvestConditions, MineralFertilizer, OrganicFertilizer,
    SowingConditions, WorkStepKind,
};

use crate::reference::{ReferenceData, ReferenceError};

/// Automatic harvest of a process: what leaves the field and what the
/// harvest waits for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarvestTrigger {
    /// Whether the primary yield leaves the field.
    pub exported: bool,
    /// Soil and weather conditions after maturity.
    pub conditions: HarvestConditions,
}

/// What a process knows about its crop when it resolves its worksteps.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CropPlan {
    /// Sown after its harvest day-of-year (overwinters).
    pub winter_crop: bool,
    /// The process's automatic harvest, if it has one.
    pub automatic_harvest: Option<HarvestTrigger>,
}

/// A crop to sow and how its planting ends.
#[derive(Debug, Clone, PartialEq)]
pub struct Sowing {
    /// Parameters of the crop to sow.
    pub crop: Box<CropParameters>,
    /// Sown after its harvest day-of-year (overwinters).
    pub winter_crop: bool,
    /// Armed on the planting when it is sown.
    pub automatic_harvest: Option<HarvestTrigger>,
}

/// A management operation with its reference data attached.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Sow a crop.
    Seed(Sowing),
    /// Open a sowing window; the crop is sown on the first day the
    /// conditions hold.
    AutomaticSowing {
        /// The crop to sow.
        sowing: Sowing,
        /// What the window waits for.
        conditions: SowingConditions,
    },
    /// Last day of a sowing window: sow unless the window already did.
    SowingDeadline(Sowing),
    /// Harvest the crop sown by the owning process.
    Harvest {
        /// Whether the primary yield leaves the field.
        exported: bool,
    },
    /// Latest date of an automatic harvest: harvest the crop of the owning
    /// process if it is still on the field.
    AutomaticHarvest {
        /// Whether the primary yield leaves the field.
        exported: bool,
    },
    /// Remove part of the above-ground biomass.
    Cutting {
        /// Fraction removed, 0 to 1.
        fraction: f64,
        /// Whether the cut biomass leaves the field.
        exported: bool,
    },
    /// Apply mineral fertilizer.
    MineralFertilize {
        /// Fertilizer record.
        fertilizer: MineralFertilizer,
        /// Nitrogen amount (kg N ha-1).
        amount: f64,
    },
    /// Top mineral N up to a demand.
    NDemandFertilize {
        /// Fertilizer record.
        fertilizer: MineralFertilizer,
        /// Mineral N the soil should hold (kg N ha-1).
        n_demand: f64,
        /// Sampling depth (m), capped by the rooting depth.
        depth: f64,
    },
    /// Apply organic fertilizer.
    OrganicFertilize {
        /// Fertilizer record.
        fertilizer: Box<OrganicFertilizer>,
        /// Fresh matter amount (kg FM ha-1).
        amount: f64,
        /// Worked into the soil right away.
        incorporate: bool,
    },
    /// Work the soil down to `depth` m.
    Tillage {
        /// Working depth (m).
        depth: f64,
    },
    /// Irrigate.
    Irrigate {
        /// Water amount (mm).
        amount: f64,
        /// Nitrate concentration of the water (mg l-1).
        nitrate_concentration: f64,
    },
}

impl Operation {
    /// Resolve a configured workstep against the reference data.
    ///
    /// `plan` is only used for sowing steps.
    pub fn from_config(
        kind: &WorkStepKind,
        reference: &ReferenceData,
        plan: CropPlan,
    ) -> Result<Self, ReferenceError> {
        let sowing = |crop: &CropId| -> Result<Sowing, ReferenceError> {
            Ok(Sowing {
                crop: Box::new(reference.crop(crop)?.clone()),
                winter_crop: plan.winter_crop,
                automatic_harvest: plan.automatic_harvest,
            })
        };
        Ok(match kind {
            WorkStepKind::Seed { crop } => Self::Seed(sowing(crop)?),
            WorkStepKind::AutomaticSowing {
                crop, conditions, ..
            } => Self::AutomaticSowing {
                sowing: sowing(crop)?,
                conditions: *conditions,
            },
            WorkStepKind::Harvest { exported } => Self::Harvest {
                exported: *exported,
            },
            WorkStepKind::AutomaticHarvest { exported, .. } => Self::AutomaticHarvest {
                exported: *exported,
            },
            WorkStepKind::Cutting {
                percentage,
                exported,
            } => Self::Cutting {
                fraction: percentage.clamp(0.0, 1.0),
                exported: *exported,
            },
            WorkStepKind::MineralFertilize { fertilizer, amount } => Self::MineralFertilize {
                fertilizer: reference.mineral_fertilizer(fertilizer)?.clone(),
                amount: *amount,
            },
            WorkStepKind::NDemandFertilize {
                fertilizer,
                n_demand,
                depth,
            } => Self::NDemandFertilize {
                fertilizer: reference.mineral_fertilizer(fertilizer)?.clone(),
                n_demand: *n_demand,
                depth: *depth,
            },
            WorkStepKind::OrganicFertilize {
                fertilizer,
                amount,
                incorporation,
            } => Self::OrganicFertilize {
                fertilizer: Box::new(reference.organic_fertilizer(fertilizer)?.clone()),
                amount: *amount,
                incorporate: *incorporation,
            },
            WorkStepKind::Tillage { depth } => Self::Tillage { depth: *depth },
            WorkStepKind::Irrigate {
                amount,
                nitrate_concentration,
            } => Self::Irrigate {
                amount: *amount,
                nitrate_concentration: *nitrate_concentration,
            },
        })
    }

    /// Short lowercase name used in log lines.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Seed(_) => "seed",
            Self::AutomaticSowing { .. } => "automatic_sowing",
            Self::SowingDeadline(_) => "sowing_deadline",
            Self::Harvest { .. } => "harvest",
            Self::AutomaticHarvest { .. } => "automatic_harvest",
            Self::Cutting { .. } => "cutting",
            Self::MineralFertilize { .. } => "mineral_fertilize",
            Self::NDemandFertilize { .. } => "n_demand_fertilize",
            Self::OrganicFertilize { .. } => "organic_fertilize",
            Self::Tillage { .. } => "tillage",
            Self::Irrigate { .. } => "irrigate",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use furrow_types::{HarvestTime, MineralFertilizerId};

    #[test]
    fn resolves_codes_from_reference_data() {
        let reference = ReferenceData::builtin();
        let op = Operation::from_config(
            &WorkStepKind::Seed {
                crop: CropId::new("WW"),
            },
            &reference,
            CropPlan {
                winter_crop: true,
                automatic_harvest: None,
            },
        )
        .unwrap();
        match op {
            Operation::Seed(sowing) => {
                assert_eq!(sowing.crop.id, CropId::new("WW"));
                assert!(sowing.winter_crop);
            }
            other => panic!("unexpected operation {other:?}"),
        }
    }

    #[test]
    fn sowing_carries_the_automatic_harvest_of_its_process() {
        let trigger = HarvestTrigger {
            exported: false,
            conditions: HarvestConditions {
                harvest_time: HarvestTime::LatestDate,
                ..HarvestConditions::default()
            },
        };
        let op = Operation::from_config(
            &WorkStepKind::AutomaticSowing {
                crop: CropId::new("SM"),
                latest: "05-20".parse().unwrap(),
                conditions: SowingConditions::default(),
            },
            &ReferenceData::builtin(),
            CropPlan {
                winter_crop: false,
                automatic_harvest: Some(trigger),
            },
        )
        .unwrap();
        match op {
            Operation::AutomaticSowing { sowing, .. } => {
                assert_eq!(sowing.automatic_harvest, Some(trigger));
            }
            other => panic!("unexpected operation {other:?}"),
        }
    }

    #[test]
    fn unknown_fertilizer_fails_at_build_time() {
        let reference = ReferenceData::builtin();
        let err = Operation::from_config(
            &WorkStepKind::MineralFertilize {
                fertilizer: MineralFertilizerId::new("ZZ"),
                amount: 40.0,
            },
            &reference,
            CropPlan::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ReferenceError::UnknownMineralFertilizer { .. }));

        let err = Operation::from_config(
            &WorkStepKind::NDemandFertilize {
                fertilizer: MineralFertilizerId::new("ZZ"),
                n_demand: 120.0,
                depth: 0.9,
            },
            &reference,
            CropPlan::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ReferenceError::UnknownMineralFertilizer { .. }));
    }

    #[test]
    fn cutting_fraction_is_clamped() {
        let op = Operation::from_config(
            &WorkStepKind::Cutting {
                percentage: 1.5,
                exported: true,
            },
            &ReferenceData::builtin(),
            CropPlan::default(),
        )
        .unwrap();
        assert_eq!(
            op,
            Operation::Cutting {
                fraction: 1.0,
                exported: true
            }
        );
    }
}
