//! Thermal-time crop growth.
//!
//! Development runs on the temperature sum above the crop's base
//! temperature, split into the stages of
//! [`CropGrowthParameters::stage_temperature_sums`]. Each day the crop:
//!
//! 1. Dies if frost hits it before the end of its second stage.
//! 2. Accumulates thermal time and advances its stage.
//! 3. Transpires from the root zone; the share of its demand it gets is the
//!    water stress factor.
//! 4. Grows from intercepted radiation, scaled by CO2 and limited by the
//!    tightest of water, nitrogen and heat stress.
//! 5. Takes up nitrogen toward the critical concentration of its biomass.
//!
//! Grain fills over the last two stages. Growth stops at maturity; once the
//! senescence temperature sum has passed after maturity the crop is dying.

use furrow_core::{CropGrowth, SoilModel, StressFactors};
use furrow_types::{CropGrowthParameters, Weather};
use tracing::debug;

/// Above-ground dry matter at sowing (kg ha-1).
const INITIAL_BIOMASS: f64 = 20.0;
/// Leaf area index per kg above-ground dry matter.
const SPECIFIC_LEAF_AREA: f64 = 0.0015;
/// Light extinction coefficient of the canopy.
const EXTINCTION: f64 = 0.6;
/// Photosynthetically active share of global radiation.
const PAR_SHARE: f64 = 0.5;
/// Relative growth gain per ppm CO2 above 350.
const CO2_RESPONSE: f64 = 0.0006;
/// Heat stress reaches zero this many degrees above the threshold.
const HEAT_STRESS_SPAN: f64 = 10.0;
/// Initial rooting depth (m).
const INITIAL_ROOT_DEPTH: f64 = 0.1;
/// N concentration of grain relative to the whole plant.
const GRAIN_N_RATIO: f64 = 1.4;
/// N concentration of roots relative to the whole plant.
const ROOT_N_RATIO: f64 = 0.6;

/// Thermal-time crop implementing [`CropGrowth`].
#[derive(Debug, Clone)]
pub struct ThermalCrop {
    params: CropGrowthParameters,
    temperature_sum: f64,
    above_ground: f64,
    roots: f64,
    nitrogen: f64,
    n_uptake: f64,
    stress: StressFactors,
    dead: bool,
}

impl ThermalCrop {
    /// A freshly sown crop.
    pub fn new(params: CropGrowthParameters) -> Self {
        let roots = INITIAL_BIOMASS * params.root_share;
        let nitrogen = (INITIAL_BIOMASS + roots) * params.critical_n_concentration;
        Self {
            params,
            temperature_sum: 0.0,
            above_ground: INITIAL_BIOMASS,
            roots,
            nitrogen,
            n_uptake: 0.0,
            stress: StressFactors::default(),
            dead: false,
        }
    }

    fn maturity(&self) -> f64 {
        self.params.maturity_temperature_sum()
    }

    /// Current rooting depth (m).
    pub fn root_depth(&self) -> f64 {
        let maturity = self.maturity();
        let progress = if maturity > 0.0 {
            (self.temperature_sum / maturity).clamp(0.0, 1.0)
        } else {
            1.0
        };
        progress
            .mul_add(self.params.max_root_depth, INITIAL_ROOT_DEPTH)
            .min(self.params.max_root_depth.max(INITIAL_ROOT_DEPTH))
    }

    /// Fraction of the canopy intercepting light.
    fn interception(&self) -> f64 {
        1.0 - (-EXTINCTION * self.above_ground * SPECIFIC_LEAF_AREA).exp()
    }

    /// Progress through the last two stages, 0 before grain filling starts.
    fn grain_fill(&self) -> f64 {
        let stages = &self.params.stage_temperature_sums;
        let filling: f64 = stages.iter().rev().take(2).sum();
        let start = self.maturity() - filling;
        if filling <= 0.0 {
            return if self.is_mature() { 1.0 } else { 0.0 };
        }
        ((self.temperature_sum - start) / filling).clamp(0.0, 1.0)
    }

    fn total_biomass(&self) -> f64 {
        self.above_ground + self.roots
    }

    fn n_concentration(&self) -> f64 {
        let biomass = self.total_biomass();
        if biomass > 0.0 {
            self.nitrogen / biomass
        } else {
            0.0
        }
    }

    fn heat_factor(&self, max_temperature: f64) -> f64 {
        let excess = max_temperature - self.params.heat_stress_temperature;
        if excess <= 0.0 {
            1.0
        } else {
            (1.0 - excess / HEAT_STRESS_SPAN).max(0.0)
        }
    }
}

impl CropGrowth for ThermalCrop {
    fn step(&mut self, weather: &Weather, co2: f64, soil: &mut dyn SoilModel) {
        if self.dead {
            return;
        }
        if weather.min_temperature < self.params.frost_kill_temperature
            && self.development_stage() < 2
        {
            debug!(
                min_temperature = weather.min_temperature,
                "Young crop killed by frost"
            );
            self.dead = true;
            return;
        }

        let was_mature = self.is_mature();
        self.temperature_sum +=
            (weather.mean_temperature - self.params.base_temperature).max(0.0);
        if was_mature {
            self.stress = StressFactors::default();
            if self.temperature_sum >= self.maturity() + self.params.senescence_temperature_sum {
                debug!(temperature_sum = self.temperature_sum, "Crop senesced");
                self.dead = true;
            }
            return;
        }

        let root_depth = self.root_depth();
        let interception = self.interception();

        let demand =
            weather.reference_evapotranspiration * self.params.crop_coefficient * interception;
        let water = if demand > 0.0 {
            soil.extract_water(demand, root_depth) / demand
        } else {
            1.0
        };

        let critical = self.params.critical_n_concentration;
        let nitrogen = if critical > 0.0 {
            (self.n_concentration() / critical).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let heat = self.heat_factor(weather.max_temperature);
        self.stress = StressFactors {
            nitrogen,
            water,
            heat,
            oxygen: 1.0,
        };

        let co2_factor = CO2_RESPONSE.mul_add(co2 - 350.0, 1.0).max(0.5);
        let limitation = water.min(nitrogen).min(heat);
        let growth = weather.global_radiation
            * PAR_SHARE
            * interception
            * self.params.radiation_use_efficiency
            * co2_factor
            * limitation;
        self.roots += growth * self.params.root_share;
        self.above_ground += growth * (1.0 - self.params.root_share);

        let n_demand = (critical * self.total_biomass() - self.nitrogen).max(0.0);
        let taken = soil.extract_nitrogen(n_demand, root_depth);
        self.nitrogen += taken;
        self.n_uptake += taken;
    }

    fn is_dying(&self) -> bool {
        self.dead
    }

    fn is_mature(&self) -> bool {
        self.temperature_sum >= self.maturity()
    }

    fn development_stage(&self) -> usize {
        let last = self.params.stage_temperature_sums.len().saturating_sub(1);
        let mut threshold = 0.0;
        let passed = self
            .params
            .stage_temperature_sums
            .iter()
            .take_while(|sum| {
                threshold += **sum;
                self.temperature_sum >= threshold
            })
            .count();
        passed.min(last)
    }

    fn temperature_sum(&self) -> f64 {
        self.temperature_sum
    }

    fn rooting_depth(&self) -> f64 {
        self.root_depth()
    }

    fn stress(&self) -> StressFactors {
        self.stress
    }

    fn above_ground_biomass(&self) -> f64 {
        self.above_ground
    }

    fn root_biomass(&self) -> f64 {
        self.roots
    }

    fn primary_yield(&self) -> f64 {
        let content = self.params.yield_dry_matter_content;
        if content > 0.0 {
            self.primary_yield_dry_matter() / content
        } else {
            0.0
        }
    }

    fn primary_yield_dry_matter(&self) -> f64 {
        self.above_ground * self.params.harvest_index * self.grain_fill()
    }

    fn secondary_yield(&self) -> f64 {
        let content = self.params.yield_dry_matter_content;
        if content > 0.0 {
            self.secondary_yield_dry_matter() / content
        } else {
            0.0
        }
    }

    fn secondary_yield_dry_matter(&self) -> f64 {
        (self.above_ground - self.primary_yield_dry_matter()) * self.params.secondary_yield_share
    }

    fn primary_yield_n_concentration(&self) -> f64 {
        self.n_concentration() * GRAIN_N_RATIO
    }

    fn above_ground_n_concentration(&self) -> f64 {
        self.n_concentration()
    }

    fn root_n_concentration(&self) -> f64 {
        self.n_concentration() * ROOT_N_RATIO
    }

    fn total_n_uptake(&self) -> f64 {
        self.n_uptake
    }

    fn apply_cutting(&mut self, fraction: f64) -> f64 {
        let removed = self.above_ground * fraction.clamp(0.0, 1.0);
        self.nitrogen -= removed * self.n_concentration();
        self.above_ground -= removed;
        removed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::soil::BucketSoil;
    use furrow_types::{SiteParameters, SoilLayer};

    fn params() -> CropGrowthParameters {
        CropGrowthParameters {
            stage_temperature_sums: vec![100.0, 200.0, 300.0, 200.0, 200.0],
            ..CropGrowthParameters::default()
        }
    }

    fn soil() -> BucketSoil {
        BucketSoil::new(&[SoilLayer::default(); 10], &SiteParameters::default())
    }

    fn warm() -> Weather {
        Weather {
            min_temperature: 12.0,
            mean_temperature: 20.0,
            max_temperature: 28.0,
            precipitation: 2.0,
            global_radiation: 20.0,
            reference_evapotranspiration: 3.0,
        }
    }

    #[test]
    fn stages_advance_with_thermal_time() {
        let mut crop = ThermalCrop::new(params());
        let mut soil = soil();
        assert_eq!(crop.development_stage(), 0);
        for _ in 0..5 {
            crop.step(&warm(), 400.0, &mut soil);
        }
        // 100 degree days completes the first stage
        assert_eq!(crop.development_stage(), 1);
        for _ in 0..45 {
            crop.step(&warm(), 400.0, &mut soil);
        }
        assert!(crop.is_mature());
        assert_eq!(crop.development_stage(), 4);
        assert!(!crop.is_dying());
    }

    #[test]
    fn biomass_grows_and_yield_appears_during_grain_fill() {
        let mut crop = ThermalCrop::new(params());
        let mut soil = soil();
        for _ in 0..20 {
            crop.step(&warm(), 400.0, &mut soil);
        }
        assert!(crop.above_ground_biomass() > INITIAL_BIOMASS);
        assert!(crop.root_biomass() > 0.0);
        assert!(crop.primary_yield() < 1e-9);
        for _ in 0..30 {
            crop.step(&warm(), 400.0, &mut soil);
        }
        assert!(crop.primary_yield_dry_matter() > 0.0);
        assert!(crop.primary_yield() > crop.primary_yield_dry_matter());
        assert!(crop.total_n_uptake() > 0.0);
    }

    #[test]
    fn cold_weather_does_not_develop() {
        let mut crop = ThermalCrop::new(params());
        let mut soil = soil();
        let cold = Weather {
            mean_temperature: -3.0,
            min_temperature: -8.0,
            max_temperature: 2.0,
            ..warm()
        };
        for _ in 0..30 {
            crop.step(&cold, 400.0, &mut soil);
        }
        assert!(crop.temperature_sum() < 1e-9);
        assert!(!crop.is_dying());
    }

    #[test]
    fn hard_frost_kills_a_young_crop() {
        let mut crop = ThermalCrop::new(params());
        let frost = Weather {
            min_temperature: -25.0,
            ..warm()
        };
        crop.step(&frost, 400.0, &mut soil());
        assert!(crop.is_dying());
    }

    #[test]
    fn crop_dies_after_senescence() {
        let mut crop = ThermalCrop::new(CropGrowthParameters {
            senescence_temperature_sum: 100.0,
            ..params()
        });
        let mut soil = soil();
        // maturity at 1000, senescence 100 later: 55 days at 20
        for _ in 0..54 {
            crop.step(&warm(), 400.0, &mut soil);
        }
        assert!(crop.is_mature());
        assert!(!crop.is_dying());
        crop.step(&warm(), 400.0, &mut soil);
        assert!(crop.is_dying());
    }

    #[test]
    fn dry_soil_stresses_the_crop() {
        let mut crop = ThermalCrop::new(params());
        let mut soil = soil();
        soil.extract_water(10_000.0, 2.0);
        crop.step(&warm(), 400.0, &mut soil);
        assert!(crop.stress().water < 1e-9);
    }

    #[test]
    fn heat_stress_above_threshold() {
        let crop = ThermalCrop::new(params());
        assert!((crop.heat_factor(30.0) - 1.0).abs() < 1e-9);
        assert!((crop.heat_factor(37.0) - 0.5).abs() < 1e-9);
        assert!(crop.heat_factor(50.0) < 1e-9);
    }

    #[test]
    fn cutting_removes_a_share_of_the_shoots() {
        let mut crop = ThermalCrop::new(params());
        let mut soil = soil();
        for _ in 0..20 {
            crop.step(&warm(), 400.0, &mut soil);
        }
        let before = crop.above_ground_biomass();
        let removed = crop.apply_cutting(0.25);
        assert!((removed - before * 0.25).abs() < 1e-9);
        assert!((crop.above_ground_biomass() - before * 0.75).abs() < 1e-9);
    }
}
