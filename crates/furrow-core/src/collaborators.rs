//! Seams to the physical process models.
//!
//! The engine decides *when* things happen. How soil water, nitrogen and
//! crop biomass respond is delegated to implementations of [`SoilModel`]
//! and [`CropGrowth`], created per field by a [`ModelFactory`].

use furrow_types::{
    CropParameters, MineralFertilizer, OrganicFertilizer, OrganicMatterParameters,
    SiteParameters, SoilLayer, Weather,
};
use serde::{Deserialize, Serialize};

/// Aggregated soil state used for result recording and harvest metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SoilSnapshot {
    /// Nitrate + ammonium in 0 to 90 cm (kg N ha-1).
    pub mineral_nitrogen_0_to_90: f64,
    /// Nitrate in 0 to 90 cm (kg N ha-1).
    pub nitrate_0_to_90: f64,
    /// Mean volumetric water content in 0 to 90 cm.
    pub water_content_0_to_90: f64,
    /// Mean volumetric water content in 0 to 30 cm.
    pub water_content_0_to_30: f64,
    /// Mean organic carbon in 0 to 10 cm (kg C kg-1).
    pub organic_carbon_0_to_10: f64,
    /// Mean organic carbon in 0 to 30 cm (kg C kg-1).
    pub organic_carbon_0_to_30: f64,
    /// Mean soil temperature in 0 to 30 cm (degrees C).
    pub soil_temperature_0_to_30: f64,
}

/// Fluxes produced by one soil general step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SoilFluxes {
    /// Water leaving the bottom of the profile (mm).
    pub groundwater_recharge: f64,
    /// Nitrate leaving the bottom of the profile (kg N ha-1).
    pub nitrogen_leaching: f64,
    /// Surface runoff (mm).
    pub surface_runoff: f64,
    /// Evaporation plus transpiration (mm).
    pub actual_evapotranspiration: f64,
}

/// Today's growth-limiting factors, 1 meaning unstressed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressFactors {
    /// Nitrogen limitation.
    pub nitrogen: f64,
    /// Water limitation.
    pub water: f64,
    /// Heat limitation.
    pub heat: f64,
    /// Oxygen (waterlogging) limitation.
    pub oxygen: f64,
}

impl Default for StressFactors {
    fn default() -> Self {
        Self {
            nitrogen: 1.0,
            water: 1.0,
            heat: 1.0,
            oxygen: 1.0,
        }
    }
}

/// Soil water, nitrogen and organic matter processes of one field.
pub trait SoilModel {
    /// Advance all soil processes by one day.
    fn general_step(&mut self, weather: &Weather, groundwater_depth: f64) -> SoilFluxes;

    /// Apply `amount` kg N ha-1 of a mineral fertilizer.
    fn apply_mineral_fertilizer(&mut self, fertilizer: &MineralFertilizer, amount: f64);

    /// Apply `amount` kg fresh matter ha-1 of an organic fertilizer.
    fn apply_organic_fertilizer(
        &mut self,
        fertilizer: &OrganicFertilizer,
        amount: f64,
        incorporate: bool,
    );

    /// Add `amount` mm of water carrying `nitrate_concentration` mg l-1.
    fn apply_irrigation(&mut self, amount: f64, nitrate_concentration: f64);

    /// Mix the profile down to `depth` m.
    fn apply_tillage(&mut self, depth: f64);

    /// Return plant material (kg dry matter ha-1) to the soil.
    fn add_organic_matter(
        &mut self,
        params: &OrganicMatterParameters,
        dry_matter: f64,
        n_concentration: f64,
    );

    /// Nitrate + ammonium from the surface down to `depth` m (kg N ha-1).
    fn mineral_nitrogen_to_depth(&self, depth: f64) -> f64;

    /// Plant-available water down to `depth` m as a fraction of capacity.
    fn available_water_fraction(&self, depth: f64) -> f64;

    /// Mean soil temperature from the surface down to `depth` m
    /// (degrees C). Defaults to the 0 to 30 cm mean of the snapshot.
    fn soil_temperature_to_depth(&self, depth: f64) -> f64 {
        let _ = depth;
        self.snapshot().soil_temperature_0_to_30
    }

    /// Whether the topsoil is too wet to drive on for fertilizing.
    fn is_too_wet_for_fertilizing(&self) -> bool;

    /// Remove up to `demand` mm of water from the root zone; returns the
    /// amount actually taken.
    fn extract_water(&mut self, demand: f64, root_depth: f64) -> f64;

    /// Remove up to `demand` kg N ha-1 of mineral N from the root zone;
    /// returns the amount actually taken.
    fn extract_nitrogen(&mut self, demand: f64, root_depth: f64) -> f64;

    /// Aggregated state for recording.
    fn snapshot(&self) -> SoilSnapshot;
}

/// Growth and development of one planted crop.
///
/// Biomass values are kg dry matter ha-1, yields kg fresh matter ha-1 unless
/// the method name says dry matter.
pub trait CropGrowth {
    /// Advance growth by one day, drawing water and nitrogen from `soil`.
    fn step(&mut self, weather: &Weather, co2: f64, soil: &mut dyn SoilModel);

    /// The crop has died (frost, senescence) and should be incorporated.
    fn is_dying(&self) -> bool;

    /// Development is complete and the crop is ready for harvest.
    fn is_mature(&self) -> bool;

    /// Current development stage, 0-based.
    fn development_stage(&self) -> usize;

    /// Accumulated temperature sum since sowing (degree days).
    fn temperature_sum(&self) -> f64;

    /// Current rooting depth (m).
    fn rooting_depth(&self) -> f64;

    /// Today's growth-limiting factors.
    fn stress(&self) -> StressFactors;

    /// Above-ground biomass.
    fn above_ground_biomass(&self) -> f64;

    /// Root biomass.
    fn root_biomass(&self) -> f64;

    /// Primary yield (fresh matter).
    fn primary_yield(&self) -> f64;

    /// Primary yield (dry matter).
    fn primary_yield_dry_matter(&self) -> f64;

    /// Secondary yield (fresh matter).
    fn secondary_yield(&self) -> f64;

    /// Secondary yield (dry matter).
    fn secondary_yield_dry_matter(&self) -> f64;

    /// N concentration of the primary yield (kg N kg-1 DM).
    fn primary_yield_n_concentration(&self) -> f64;

    /// N concentration of the above-ground biomass (kg N kg-1 DM).
    fn above_ground_n_concentration(&self) -> f64;

    /// N concentration of the roots (kg N kg-1 DM).
    fn root_n_concentration(&self) -> f64;

    /// Total N taken up since sowing (kg N ha-1).
    fn total_n_uptake(&self) -> f64;

    /// Remove `fraction` of the above-ground biomass; returns the removed
    /// dry matter.
    fn apply_cutting(&mut self, fraction: f64) -> f64;
}

/// Creates the process models of a field.
pub trait ModelFactory {
    /// Soil model for the given profile.
    fn soil(&self, layers: &[SoilLayer], site: &SiteParameters) -> Box<dyn SoilModel>;

    /// Growth model for a newly sown crop.
    fn crop(&self, params: &CropParameters, site: &SiteParameters) -> Box<dyn CropGrowth>;
}
