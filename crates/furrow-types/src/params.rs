//! Agronomic parameter records.
//!
//! These are the records held by the reference data service (crops,
//! fertilizers) and the per-field parameter blocks (site, soil layers,
//! N-min method, automatic irrigation). All of them deserialize from YAML
//! with sensible defaults for omitted fields.

use serde::{Deserialize, Serialize};

use crate::ids::{CropId, MineralFertilizerId, OrganicFertilizerId};

// ---------------------------------------------------------------------------
// Crops
// ---------------------------------------------------------------------------

/// Everything the engine and the crop model need to know about a crop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropParameters {
    /// Reference-data code.
    pub id: CropId,
    /// Human-readable name.
    pub name: String,
    /// Harvest automatically on the first day the crop reports maturity.
    #[serde(default)]
    pub auto_harvest: bool,
    /// Targets for the N-min fertilization method.
    #[serde(default)]
    pub nmin: NMinCropParameters,
    /// Temperature-sum window in which automatic irrigation may fire.
    #[serde(default)]
    pub irrigation_window: IrrigationWindow,
    /// How crop residues decompose once returned to the soil.
    #[serde(default)]
    pub residues: OrganicMatterParameters,
    /// Growth parameters consumed by the crop model.
    #[serde(default)]
    pub growth: CropGrowthParameters,
}

/// Crop-specific targets for the N-min fertilization method.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NMinCropParameters {
    /// Depth down to which mineral N is sampled (m).
    #[serde(default = "default_sampling_depth")]
    pub sampling_depth: f64,
    /// Target mineral N down to the sampling depth (kg N ha-1).
    #[serde(default = "default_target_n")]
    pub target_n_sampling_depth: f64,
    /// Target mineral N in 0 to 30 cm (kg N ha-1).
    #[serde(default = "default_target_n30")]
    pub target_n30: f64,
}

const fn default_sampling_depth() -> f64 {
    0.9
}

const fn default_target_n() -> f64 {
    120.0
}

const fn default_target_n30() -> f64 {
    40.0
}

impl Default for NMinCropParameters {
    fn default() -> Self {
        Self {
            sampling_depth: default_sampling_depth(),
            target_n_sampling_depth: default_target_n(),
            target_n30: default_target_n30(),
        }
    }
}

/// Temperature-sum bounds (degree days) for automatic irrigation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrrigationWindow {
    /// Irrigation allowed from this temperature sum on.
    #[serde(default)]
    pub start: f64,
    /// Irrigation allowed up to this temperature sum.
    #[serde(default = "default_window_end")]
    pub end: f64,
}

const fn default_window_end() -> f64 {
    2000.0
}

impl Default for IrrigationWindow {
    fn default() -> Self {
        Self {
            start: 0.0,
            end: default_window_end(),
        }
    }
}

impl IrrigationWindow {
    /// Whether `temperature_sum` lies inside the window (bounds inclusive).
    pub fn contains(&self, temperature_sum: f64) -> bool {
        temperature_sum >= self.start && temperature_sum <= self.end
    }
}

/// Parameters of the thermal-time crop model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropGrowthParameters {
    /// Base temperature for thermal time (degrees C).
    #[serde(default)]
    pub base_temperature: f64,
    /// Temperature sum needed to complete each development stage.
    #[serde(default = "default_stage_temperature_sums")]
    pub stage_temperature_sums: Vec<f64>,
    /// Temperature sum after maturity at which the crop dies off.
    #[serde(default = "default_senescence_sum")]
    pub senescence_temperature_sum: f64,
    /// Radiation use efficiency (kg dry matter per MJ m-2).
    #[serde(default = "default_rue")]
    pub radiation_use_efficiency: f64,
    /// Fraction of new biomass allocated to roots.
    #[serde(default = "default_root_share")]
    pub root_share: f64,
    /// Share of above-ground biomass in the primary yield at harvest.
    #[serde(default = "default_harvest_index")]
    pub harvest_index: f64,
    /// Share of the remaining above-ground biomass taken as secondary yield.
    #[serde(default = "default_secondary_share")]
    pub secondary_yield_share: f64,
    /// Dry matter content of the primary yield (kg DM kg-1 fresh matter).
    #[serde(default = "default_dry_matter_content")]
    pub yield_dry_matter_content: f64,
    /// Maximum rooting depth (m).
    #[serde(default = "default_max_root_depth")]
    pub max_root_depth: f64,
    /// Critical nitrogen concentration of biomass (kg N kg-1 DM).
    #[serde(default = "default_critical_n")]
    pub critical_n_concentration: f64,
    /// Crop coefficient at full canopy.
    #[serde(default = "default_crop_coefficient")]
    pub crop_coefficient: f64,
    /// Maximum temperature above which heat stress starts (degrees C).
    #[serde(default = "default_heat_stress_temperature")]
    pub heat_stress_temperature: f64,
    /// Minimum temperature below which a young crop is killed (degrees C).
    #[serde(default = "default_frost_kill_temperature")]
    pub frost_kill_temperature: f64,
}

fn default_stage_temperature_sums() -> Vec<f64> {
    vec![150.0, 400.0, 600.0, 300.0, 250.0]
}

const fn default_senescence_sum() -> f64 {
    800.0
}

const fn default_rue() -> f64 {
    25.0
}

const fn default_root_share() -> f64 {
    0.2
}

const fn default_harvest_index() -> f64 {
    0.45
}

const fn default_secondary_share() -> f64 {
    0.6
}

const fn default_dry_matter_content() -> f64 {
    0.86
}

const fn default_max_root_depth() -> f64 {
    1.2
}

const fn default_critical_n() -> f64 {
    0.02
}

const fn default_crop_coefficient() -> f64 {
    1.1
}

const fn default_heat_stress_temperature() -> f64 {
    32.0
}

const fn default_frost_kill_temperature() -> f64 {
    -18.0
}

impl Default for CropGrowthParameters {
    fn default() -> Self {
        Self {
            base_temperature: 0.0,
            stage_temperature_sums: default_stage_temperature_sums(),
            senescence_temperature_sum: default_senescence_sum(),
            radiation_use_efficiency: default_rue(),
            root_share: default_root_share(),
            harvest_index: default_harvest_index(),
            secondary_yield_share: default_secondary_share(),
            yield_dry_matter_content: default_dry_matter_content(),
            max_root_depth: default_max_root_depth(),
            critical_n_concentration: default_critical_n(),
            crop_coefficient: default_crop_coefficient(),
            heat_stress_temperature: default_heat_stress_temperature(),
            frost_kill_temperature: default_frost_kill_temperature(),
        }
    }
}

impl CropGrowthParameters {
    /// Temperature sum at which the crop is mature.
    pub fn maturity_temperature_sum(&self) -> f64 {
        self.stage_temperature_sums.iter().sum()
    }
}

// ---------------------------------------------------------------------------
// Organic matter and fertilizers
// ---------------------------------------------------------------------------

/// Decomposition behavior of organic matter added to the soil.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrganicMatterParameters {
    /// Carbon content of the dry matter (kg C kg-1 DM).
    #[serde(default = "default_carbon_content")]
    pub carbon_content: f64,
    /// First-order decomposition rate at 20 degrees C (d-1).
    #[serde(default = "default_decomposition_rate")]
    pub decomposition_rate: f64,
}

const fn default_carbon_content() -> f64 {
    0.45
}

const fn default_decomposition_rate() -> f64 {
    0.012
}

impl Default for OrganicMatterParameters {
    fn default() -> Self {
        Self {
            carbon_content: default_carbon_content(),
            decomposition_rate: default_decomposition_rate(),
        }
    }
}

/// A mineral fertilizer and how its nitrogen is split between forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MineralFertilizer {
    /// Reference-data code.
    pub id: MineralFertilizerId,
    /// Human-readable name.
    pub name: String,
    /// Fraction of N as nitrate.
    pub nitrate_fraction: f64,
    /// Fraction of N as ammonium.
    pub ammonium_fraction: f64,
    /// Fraction of N as urea (treated as ammonium once in the soil).
    #[serde(default)]
    pub urea_fraction: f64,
}

/// An organic fertilizer (slurry, manure, compost).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganicFertilizer {
    /// Reference-data code.
    pub id: OrganicFertilizerId,
    /// Human-readable name.
    pub name: String,
    /// Dry matter content of the fresh material (kg DM kg-1 FM).
    pub dry_matter_content: f64,
    /// Nitrogen concentration of the dry matter (kg N kg-1 DM).
    pub n_concentration: f64,
    /// Share of the nitrogen present as ammonium.
    #[serde(default)]
    pub ammonium_share: f64,
    /// Decomposition behavior once incorporated.
    #[serde(default)]
    pub organic_matter: OrganicMatterParameters,
}

// ---------------------------------------------------------------------------
// Site and soil
// ---------------------------------------------------------------------------

/// One soil layer of a field's profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoilLayer {
    /// Layer thickness (m).
    #[serde(default = "default_layer_thickness")]
    pub thickness: f64,
    /// Volumetric water content at field capacity.
    #[serde(default = "default_field_capacity")]
    pub field_capacity: f64,
    /// Volumetric water content at the permanent wilting point.
    #[serde(default = "default_wilting_point")]
    pub wilting_point: f64,
    /// Volumetric water content at saturation.
    #[serde(default = "default_saturation")]
    pub saturation: f64,
    /// Organic carbon content (kg C kg-1 soil).
    #[serde(default = "default_organic_carbon")]
    pub organic_carbon: f64,
    /// Bulk density (kg m-3).
    #[serde(default = "default_bulk_density")]
    pub bulk_density: f64,
    /// Initial water content as a fraction of field capacity.
    #[serde(default = "default_initial_moisture")]
    pub initial_moisture_fraction: f64,
    /// Initial nitrate (kg N ha-1 in the layer).
    #[serde(default = "default_initial_nitrate")]
    pub initial_nitrate: f64,
    /// Initial ammonium (kg N ha-1 in the layer).
    #[serde(default)]
    pub initial_ammonium: f64,
}

const fn default_layer_thickness() -> f64 {
    0.1
}

const fn default_field_capacity() -> f64 {
    0.3
}

const fn default_wilting_point() -> f64 {
    0.12
}

const fn default_saturation() -> f64 {
    0.45
}

const fn default_organic_carbon() -> f64 {
    0.012
}

const fn default_bulk_density() -> f64 {
    1450.0
}

const fn default_initial_moisture() -> f64 {
    0.8
}

const fn default_initial_nitrate() -> f64 {
    5.0
}

impl Default for SoilLayer {
    fn default() -> Self {
        Self {
            thickness: default_layer_thickness(),
            field_capacity: default_field_capacity(),
            wilting_point: default_wilting_point(),
            saturation: default_saturation(),
            organic_carbon: default_organic_carbon(),
            bulk_density: default_bulk_density(),
            initial_moisture_fraction: default_initial_moisture(),
            initial_nitrate: default_initial_nitrate(),
            initial_ammonium: 0.0,
        }
    }
}

/// Site-level parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SiteParameters {
    /// Latitude (decimal degrees).
    #[serde(default = "default_latitude")]
    pub latitude: f64,
    /// Slope (m m-1), drives surface runoff.
    #[serde(default)]
    pub slope: f64,
    /// Atmospheric CO2 (ppm). Zero selects the historical curve by date.
    #[serde(default)]
    pub atmospheric_co2: f64,
    /// Groundwater table bounds.
    #[serde(default)]
    pub groundwater: GroundwaterParameters,
}

const fn default_latitude() -> f64 {
    52.5
}

impl Default for SiteParameters {
    fn default() -> Self {
        Self {
            latitude: default_latitude(),
            slope: 0.0,
            atmospheric_co2: 0.0,
            groundwater: GroundwaterParameters::default(),
        }
    }
}

/// Seasonal groundwater table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundwaterParameters {
    /// Shallowest depth of the table over the year (m).
    #[serde(default = "default_groundwater_depth")]
    pub min_depth: f64,
    /// Deepest depth of the table over the year (m).
    #[serde(default = "default_groundwater_depth")]
    pub max_depth: f64,
    /// Month in which the table is shallowest.
    #[serde(default = "default_min_depth_month")]
    pub min_depth_month: u32,
}

const fn default_groundwater_depth() -> f64 {
    20.0
}

const fn default_min_depth_month() -> u32 {
    3
}

impl Default for GroundwaterParameters {
    fn default() -> Self {
        Self {
            min_depth: default_groundwater_depth(),
            max_depth: default_groundwater_depth(),
            min_depth_month: default_min_depth_month(),
        }
    }
}

// ---------------------------------------------------------------------------
// Management automation
// ---------------------------------------------------------------------------

/// User bounds for the N-min fertilization method.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NMinUserParameters {
    /// Demands below this dose (kg N ha-1) are not applied.
    #[serde(default = "default_nmin_min")]
    pub min: f64,
    /// Largest single dose (kg N ha-1); the surplus becomes a top dressing.
    #[serde(default = "default_nmin_max")]
    pub max: f64,
    /// Days between the main dose and the top dressing.
    #[serde(default = "default_nmin_delay")]
    pub delay_in_days: u32,
    /// Day of year on which winter crops receive their dose.
    #[serde(default = "default_winter_crop_day")]
    pub winter_crop_day_of_year: u32,
}

const fn default_nmin_min() -> f64 {
    10.0
}

const fn default_nmin_max() -> f64 {
    100.0
}

const fn default_nmin_delay() -> u32 {
    30
}

const fn default_winter_crop_day() -> u32 {
    74
}

impl Default for NMinUserParameters {
    fn default() -> Self {
        Self {
            min: default_nmin_min(),
            max: default_nmin_max(),
            delay_in_days: default_nmin_delay(),
            winter_crop_day_of_year: default_winter_crop_day(),
        }
    }
}

/// Settings for moisture-triggered irrigation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutoIrrigationParameters {
    /// Water applied per event (mm).
    #[serde(default = "default_irrigation_amount")]
    pub amount: f64,
    /// Irrigate when the plant-available water fraction falls to this value.
    #[serde(default = "default_irrigation_threshold")]
    pub threshold: f64,
    /// Nitrate concentration of the irrigation water (mg l-1).
    #[serde(default)]
    pub nitrate_concentration: f64,
    /// Depth over which plant-available water is evaluated (m).
    #[serde(default = "default_critical_depth")]
    pub critical_depth: f64,
}

const fn default_irrigation_amount() -> f64 {
    17.0
}

const fn default_irrigation_threshold() -> f64 {
    0.35
}

const fn default_critical_depth() -> f64 {
    0.3
}

impl Default for AutoIrrigationParameters {
    fn default() -> Self {
        Self {
            amount: default_irrigation_amount(),
            threshold: default_irrigation_threshold(),
            nitrate_concentration: 0.0,
            critical_depth: default_critical_depth(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn crop_parameters_fill_defaults() {
        let yaml = "id: WW\nname: winter wheat\n";
        let crop: CropParameters = serde_yml::from_str(yaml).unwrap();
        assert_eq!(crop.id, CropId::new("WW"));
        assert!(!crop.auto_harvest);
        assert_eq!(crop.nmin, NMinCropParameters::default());
        assert_eq!(crop.growth.stage_temperature_sums.len(), 5);
    }

    #[test]
    fn maturity_is_sum_of_stages() {
        let growth = CropGrowthParameters {
            stage_temperature_sums: vec![100.0, 200.0, 300.0],
            ..CropGrowthParameters::default()
        };
        assert!((growth.maturity_temperature_sum() - 600.0).abs() < 1e-9);
    }

    #[test]
    fn irrigation_window_bounds_are_inclusive() {
        let window = IrrigationWindow {
            start: 100.0,
            end: 900.0,
        };
        assert!(window.contains(100.0));
        assert!(window.contains(900.0));
        assert!(!window.contains(99.0));
        assert!(!window.contains(901.0));
    }

    #[test]
    fn automation_defaults_match_documented_values() {
        let irrigation = AutoIrrigationParameters::default();
        assert!((irrigation.amount - 17.0).abs() < f64::EPSILON);
        assert!((irrigation.threshold - 0.35).abs() < f64::EPSILON);
        let nmin = NMinUserParameters::default();
        assert_eq!(nmin.winter_crop_day_of_year, 74);
    }
}
