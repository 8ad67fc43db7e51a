//! Crop lifecycle: which planting occupies the field and what it has
//! accumulated so far.
//!
//! A field holds at most one [`Planting`]. Sowing creates it, and harvest or
//! incorporation of a dying crop removes it again. Plantings carry a
//! [`PlantingId`] and the index of the process that sowed them, so that
//! harvest steps and automatically produced results always reach the right
//! production process.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use furrow_types::{CropMetric, CropParameters, PlantingId};

use crate::collaborators::{CropGrowth, StressFactors};
use crate::operation::HarvestTrigger;

/// Stress accumulated over a planting's life (sum of daily `1 - factor`).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StressTotals {
    /// Nitrogen stress.
    pub nitrogen: f64,
    /// Water stress.
    pub water: f64,
    /// Heat stress.
    pub heat: f64,
    /// Oxygen stress.
    pub oxygen: f64,
}

impl StressTotals {
    fn add(&mut self, today: StressFactors) {
        self.nitrogen += 1.0 - today.nitrogen;
        self.water += 1.0 - today.water;
        self.heat += 1.0 - today.heat;
        self.oxygen += 1.0 - today.oxygen;
    }
}

/// The crop currently growing on a field.
pub struct Planting {
    /// Identity of this planting.
    pub id: PlantingId,
    /// Index of the production process that sowed it.
    pub owner: usize,
    /// Crop template.
    pub params: CropParameters,
    /// Sowing date.
    pub sown: NaiveDate,
    /// Overwintering crop (sown after its harvest day-of-year).
    pub winter_crop: bool,
    /// Whether the winter-crop N-min dose has been given.
    pub winter_nmin_applied: bool,
    /// Growth model.
    pub growth: Box<dyn CropGrowth>,
    /// Days the crop has been stepped.
    pub days_with_crop: u32,
    /// Accumulated stress.
    pub stress: StressTotals,
    /// Irrigation applied since sowing (mm).
    pub applied_irrigation: f64,
    /// Biomass removed by cutting (kg DM ha-1).
    pub cut_biomass: f64,
    /// Automatic harvest armed by the sowing.
    pub harvest_trigger: Option<HarvestTrigger>,
}

impl core::fmt::Debug for Planting {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Planting")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("crop", &self.params.id)
            .field("sown", &self.sown)
            .field("winter_crop", &self.winter_crop)
            .field("days_with_crop", &self.days_with_crop)
            .finish_non_exhaustive()
    }
}

impl Planting {
    /// Count one stepped day and add today's stress.
    pub fn record_day(&mut self) {
        self.days_with_crop = self.days_with_crop.saturating_add(1);
        self.stress.add(self.growth.stress());
    }

    /// Values accumulated over the planting's life, keyed for a cycle record.
    pub fn totals(&self) -> BTreeMap<CropMetric, f64> {
        BTreeMap::from([
            (CropMetric::DaysWithCrop, f64::from(self.days_with_crop)),
            (CropMetric::NitrogenStress, self.stress.nitrogen),
            (CropMetric::WaterStress, self.stress.water),
            (CropMetric::HeatStress, self.stress.heat),
            (CropMetric::OxygenStress, self.stress.oxygen),
            (CropMetric::SumIrrigation, self.applied_irrigation),
            (CropMetric::CutBiomass, self.cut_biomass),
        ])
    }
}

/// Metrics produced when a planting ends, addressed to its owning process.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    /// Process that sowed the planting.
    pub owner: usize,
    /// The planting that ended.
    pub planting: PlantingId,
    /// Recorded values.
    pub metrics: BTreeMap<CropMetric, f64>,
}

/// Holder of the field's single planting.
#[derive(Debug)]
pub struct CropLifecycle {
    current: Option<Planting>,
    next_id: PlantingId,
}

impl Default for CropLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl CropLifecycle {
    /// An empty field.
    pub const fn new() -> Self {
        Self {
            current: None,
            next_id: PlantingId(1),
        }
    }

    /// Whether a crop is growing.
    pub const fn is_growing(&self) -> bool {
        self.current.is_some()
    }

    /// The growing planting.
    pub const fn current(&self) -> Option<&Planting> {
        self.current.as_ref()
    }

    /// The growing planting, mutably.
    pub const fn current_mut(&mut self) -> Option<&mut Planting> {
        self.current.as_mut()
    }

    /// Whether the growing planting is `id` and still alive.
    pub fn is_live(&self, id: Option<PlantingId>) -> bool {
        self.current
            .as_ref()
            .is_some_and(|p| Some(p.id) == id && !p.growth.is_dying())
    }

    /// Whether the growing crop is dying.
    pub fn is_dying(&self) -> bool {
        self.current.as_ref().is_some_and(|p| p.growth.is_dying())
    }

    /// Put a new planting on the field. Returns `None` when one is already
    /// growing; the field is left unchanged in that case.
    pub fn sow(
        &mut self,
        owner: usize,
        params: CropParameters,
        sown: NaiveDate,
        winter_crop: bool,
        growth: Box<dyn CropGrowth>,
    ) -> Option<PlantingId> {
        if self.current.is_some() {
            return None;
        }
        let id = self.next_id;
        self.next_id = id.next();
        self.current = Some(Planting {
            id,
            owner,
            params,
            sown,
            winter_crop,
            winter_nmin_applied: false,
            growth,
            days_with_crop: 0,
            stress: StressTotals::default(),
            applied_irrigation: 0.0,
            cut_biomass: 0.0,
            harvest_trigger: None,
        });
        Some(id)
    }

    /// Remove the planting from the field.
    pub const fn release(&mut self) -> Option<Planting> {
        self.current.take()
    }

    /// Development stage as recorded in the daily series: 0 without a crop,
    /// stage + 1 otherwise.
    pub fn development_stage_value(&self) -> f64 {
        self.current.as_ref().map_or(0.0, |p| {
            let stage = u32::try_from(p.growth.development_stage()).unwrap_or(u32::MAX);
            f64::from(stage.saturating_add(1))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::collaborators::SoilModel;
    use furrow_types::{CropId, Weather};

    /// Crop that never grows; stage and dying flag are set by the test.
    struct StaticCrop {
        stage: usize,
        dying: bool,
    }

    impl CropGrowth for StaticCrop {
        fn step(&mut self, _: &Weather, _: f64, _: &mut dyn SoilModel) {}
        fn is_dying(&self) -> bool {
            self.dying
        }
        fn is_mature(&self) -> bool {
            false
        }
        fn development_stage(&self) -> usize {
            self.stage
        }
        fn temperature_sum(&self) -> f64 {
            0.0
        }
        fn rooting_depth(&self) -> f64 {
            0.3
        }
        fn stress(&self) -> StressFactors {
            StressFactors {
                water: 0.75,
                ..StressFactors::default()
            }
        }
        fn above_ground_biomass(&self) -> f64 {
            0.0
        }
        fn root_biomass(&self) -> f64 {
            0.0
        }
        fn primary_yield(&self) -> f64 {
            0.0
        }
        fn primary_yield_dry_matter(&self) -> f64 {
            0.0
        }
        fn secondary_yield(&self) -> f64 {
            0.0
        }
        fn secondary_yield_dry_matter(&self) -> f64 {
            0.0
        }
        fn primary_yield_n_concentration(&self) -> f64 {
            0.0
        }
        fn above_ground_n_concentration(&self) -> f64 {
            0.0
        }
        fn root_n_concentration(&self) -> f64 {
            0.0
        }
        fn total_n_uptake(&self) -> f64 {
            0.0
        }
        fn apply_cutting(&mut self, _: f64) -> f64 {
            0.0
        }
    }

    fn params() -> CropParameters {
        serde_json::from_str(r#"{"id":"WW","name":"winter wheat"}"#).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 9, 20).unwrap()
    }

    fn sow(lifecycle: &mut CropLifecycle, dying: bool) -> Option<PlantingId> {
        lifecycle.sow(
            0,
            params(),
            date(),
            true,
            Box::new(StaticCrop { stage: 2, dying }),
        )
    }

    #[test]
    fn sowing_twice_is_refused() {
        let mut lifecycle = CropLifecycle::new();
        let first = sow(&mut lifecycle, false).unwrap();
        assert!(sow(&mut lifecycle, false).is_none());
        assert_eq!(lifecycle.current().unwrap().id, first);
    }

    #[test]
    fn planting_ids_are_unique_across_sowings() {
        let mut lifecycle = CropLifecycle::new();
        let first = sow(&mut lifecycle, false).unwrap();
        lifecycle.release();
        let second = sow(&mut lifecycle, false).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn liveness_checks_identity_and_dying() {
        let mut lifecycle = CropLifecycle::new();
        let id = sow(&mut lifecycle, false).unwrap();
        assert!(lifecycle.is_live(Some(id)));
        assert!(!lifecycle.is_live(Some(id.next())));
        assert!(!lifecycle.is_live(None));

        lifecycle.release();
        let dying = sow(&mut lifecycle, true).unwrap();
        assert!(!lifecycle.is_live(Some(dying)));
        assert!(lifecycle.is_dying());
    }

    #[test]
    fn development_stage_value_is_offset_by_one() {
        let mut lifecycle = CropLifecycle::new();
        assert!(lifecycle.development_stage_value().abs() < f64::EPSILON);
        sow(&mut lifecycle, false).unwrap();
        assert!((lifecycle.development_stage_value() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn totals_accumulate_stress_and_days() {
        let mut lifecycle = CropLifecycle::new();
        sow(&mut lifecycle, false).unwrap();
        let planting = lifecycle.current_mut().unwrap();
        planting.record_day();
        planting.record_day();
        let totals = planting.totals();
        assert!((totals[&CropMetric::DaysWithCrop] - 2.0).abs() < f64::EPSILON);
        assert!((totals[&CropMetric::WaterStress] - 0.5).abs() < 1e-9);
        assert!(totals[&CropMetric::NitrogenStress].abs() < 1e-9);
        assert_eq!(planting.params.id, CropId::new("WW"));
    }
}
