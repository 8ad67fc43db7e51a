//! Scripted collaborators shared by the `furrow-core` integration tests.
//!
//! The soil and crop doubles do no physics. They report fixed values, grow
//! by a fixed increment per day and write every call that changes the field
//! into a shared [`Journal`], so tests can assert what the engine asked for
//! and in which order.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use chrono::NaiveDate;
use furrow_core::{
    CropGrowth, FieldConfig, Horizon, ModelFactory, SoilFluxes, SoilModel, SoilSnapshot,
    StressFactors,
};
use furrow_types::{
    CropParameters, MineralFertilizer, OrganicFertilizer, OrganicMatterParameters,
    SiteParameters, SoilLayer, Weather,
};

/// Everything the doubles were asked to do.
#[derive(Debug, Default)]
pub struct Journal {
    /// Field-changing calls, in order.
    pub events: Vec<String>,
    /// Soil general steps so far.
    pub general_steps: u32,
}

impl Journal {
    /// Number of events starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.events.iter().filter(|e| e.starts_with(prefix)).count()
    }
}

/// Fixed soil state.
#[derive(Debug, Clone, Copy)]
pub struct SoilScript {
    /// Mineral N reported for every depth (kg N ha-1).
    pub mineral_n: f64,
    /// Available water fraction reported for every depth.
    pub water: f64,
    /// The soil is too wet to fertilize during its first `wet_steps`
    /// general steps.
    pub wet_steps: u32,
}

impl Default for SoilScript {
    fn default() -> Self {
        Self {
            mineral_n: 20.0,
            water: 0.8,
            wet_steps: 0,
        }
    }
}

/// How a scripted crop develops.
#[derive(Debug, Clone, Copy, Default)]
pub struct CropScript {
    /// Mature after this many crop steps.
    pub maturity_days: Option<u32>,
    /// Dying after this many crop steps.
    pub dies_after: Option<u32>,
}

/// Factory for the scripted doubles.
#[derive(Debug, Default)]
pub struct ScriptedFactory {
    /// Soil behavior.
    pub soil: SoilScript,
    /// Crop behavior by crop code; unknown codes never mature or die.
    pub crops: BTreeMap<String, CropScript>,
    /// Shared journal.
    pub journal: Rc<RefCell<Journal>>,
}

impl ScriptedFactory {
    /// Factory with default scripts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a crop script.
    pub fn with_crop(mut self, code: &str, script: CropScript) -> Self {
        self.crops.insert(code.to_owned(), script);
        self
    }

    /// Replace the soil script.
    pub fn with_soil(mut self, soil: SoilScript) -> Self {
        self.soil = soil;
        self
    }

    /// Copy of the journal's events.
    pub fn events(&self) -> Vec<String> {
        self.journal.borrow().events.clone()
    }

    /// Number of events starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.journal.borrow().count(prefix)
    }
}

impl ModelFactory for ScriptedFactory {
    fn soil(&self, _layers: &[SoilLayer], _site: &SiteParameters) -> Box<dyn SoilModel> {
        Box::new(ScriptedSoil {
            script: self.soil,
            journal: Rc::clone(&self.journal),
        })
    }

    fn crop(&self, params: &CropParameters, _site: &SiteParameters) -> Box<dyn CropGrowth> {
        self.journal
            .borrow_mut()
            .events
            .push(format!("sow:{}", params.id));
        Box::new(ScriptedCrop {
            script: self
                .crops
                .get(params.id.as_str())
                .copied()
                .unwrap_or_default(),
            days: 0,
            biomass: 0.0,
        })
    }
}

struct ScriptedSoil {
    script: SoilScript,
    journal: Rc<RefCell<Journal>>,
}

impl ScriptedSoil {
    fn log(&self, event: String) {
        self.journal.borrow_mut().events.push(event);
    }
}

impl SoilModel for ScriptedSoil {
    fn general_step(&mut self, weather: &Weather, _groundwater_depth: f64) -> SoilFluxes {
        let mut journal = self.journal.borrow_mut();
        journal.general_steps = journal.general_steps.saturating_add(1);
        SoilFluxes {
            groundwater_recharge: weather.precipitation * 0.1,
            nitrogen_leaching: weather.precipitation * 0.01,
            surface_runoff: 0.0,
            actual_evapotranspiration: weather.reference_evapotranspiration,
        }
    }

    fn apply_mineral_fertilizer(&mut self, fertilizer: &MineralFertilizer, amount: f64) {
        self.log(format!("mineral:{}:{amount}", fertilizer.id));
    }

    fn apply_organic_fertilizer(
        &mut self,
        fertilizer: &OrganicFertilizer,
        amount: f64,
        _incorporate: bool,
    ) {
        self.log(format!("organic:{}:{amount}", fertilizer.id));
    }

    fn apply_irrigation(&mut self, amount: f64, _nitrate_concentration: f64) {
        self.log(format!("irrigation:{amount}"));
    }

    fn apply_tillage(&mut self, _depth: f64) {
        self.log("tillage".to_owned());
    }

    fn add_organic_matter(
        &mut self,
        _params: &OrganicMatterParameters,
        _dry_matter: f64,
        _n_concentration: f64,
    ) {
        self.log("residues".to_owned());
    }

    fn mineral_nitrogen_to_depth(&self, _depth: f64) -> f64 {
        self.script.mineral_n
    }

    fn available_water_fraction(&self, _depth: f64) -> f64 {
        self.script.water
    }

    fn is_too_wet_for_fertilizing(&self) -> bool {
        self.journal.borrow().general_steps < self.script.wet_steps
    }

    fn extract_water(&mut self, demand: f64, _root_depth: f64) -> f64 {
        demand
    }

    fn extract_nitrogen(&mut self, demand: f64, _root_depth: f64) -> f64 {
        demand
    }

    fn snapshot(&self) -> SoilSnapshot {
        SoilSnapshot {
            mineral_nitrogen_0_to_90: self.script.mineral_n,
            nitrate_0_to_90: self.script.mineral_n * 0.5,
            water_content_0_to_90: 0.25,
            water_content_0_to_30: 0.22,
            organic_carbon_0_to_10: 0.012,
            organic_carbon_0_to_30: 0.011,
            soil_temperature_0_to_30: 8.0,
        }
    }
}

struct ScriptedCrop {
    script: CropScript,
    days: u32,
    biomass: f64,
}

impl CropGrowth for ScriptedCrop {
    fn step(&mut self, _weather: &Weather, _co2: f64, soil: &mut dyn SoilModel) {
        self.days = self.days.saturating_add(1);
        self.biomass += 10.0;
        soil.extract_water(1.0, 0.5);
    }

    fn is_dying(&self) -> bool {
        self.script.dies_after.is_some_and(|d| self.days >= d)
    }

    fn is_mature(&self) -> bool {
        self.script.maturity_days.is_some_and(|d| self.days >= d)
    }

    fn development_stage(&self) -> usize {
        usize::try_from(self.days / 10).unwrap_or(0).min(5)
    }

    fn temperature_sum(&self) -> f64 {
        f64::from(self.days) * 10.0
    }

    fn rooting_depth(&self) -> f64 {
        0.5
    }

    fn stress(&self) -> StressFactors {
        StressFactors::default()
    }

    fn above_ground_biomass(&self) -> f64 {
        self.biomass
    }

    fn root_biomass(&self) -> f64 {
        self.biomass * 0.2
    }

    fn primary_yield(&self) -> f64 {
        self.biomass * 0.4
    }

    fn primary_yield_dry_matter(&self) -> f64 {
        self.biomass * 0.4 * 0.86
    }

    fn secondary_yield(&self) -> f64 {
        self.biomass * 0.3
    }

    fn secondary_yield_dry_matter(&self) -> f64 {
        self.biomass * 0.3 * 0.86
    }

    fn primary_yield_n_concentration(&self) -> f64 {
        0.02
    }

    fn above_ground_n_concentration(&self) -> f64 {
        0.015
    }

    fn root_n_concentration(&self) -> f64 {
        0.01
    }

    fn total_n_uptake(&self) -> f64 {
        self.biomass * 0.015
    }

    fn apply_cutting(&mut self, fraction: f64) -> f64 {
        let removed = self.biomass * fraction;
        self.biomass -= removed;
        removed
    }
}

/// Parse a field configuration.
pub fn field(yaml: &str) -> FieldConfig {
    serde_yml::from_str(yaml).expect("field config parses")
}

/// Calendar date.
pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Horizon between two dates.
pub fn horizon(start: NaiveDate, end: NaiveDate) -> Horizon {
    Horizon::new(start, end).unwrap()
}

/// One weather record per day, with precipitation cycling through 0..5 mm.
pub fn climate(horizon: &Horizon) -> Vec<Weather> {
    (0_u32..)
        .zip(horizon.dates())
        .map(|(n, _)| Weather {
            precipitation: f64::from(n % 5),
            ..Weather::mild()
        })
        .collect()
}

/// Index of `date` in the daily series of a run starting on `start`.
pub fn day_index(start: NaiveDate, date: NaiveDate) -> usize {
    usize::try_from(date.signed_duration_since(start).num_days()).unwrap()
}
