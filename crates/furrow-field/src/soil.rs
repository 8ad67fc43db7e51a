//! Layered bucket soil.
//!
//! A one-dimensional soil column of homogeneous layers. Each day:
//!
//! 1. Layer temperatures relax toward the air temperature, slower with depth.
//! 2. Fresh organic matter and humus mineralize to ammonium; ammonium
//!    nitrifies to nitrate.
//! 3. Rain infiltrates (minus surface runoff), the topsoil evaporates, and
//!    water above field capacity drains layer by layer, carrying nitrate
//!    with it. What leaves the deepest unsaturated layer is groundwater
//!    recharge and N leaching.
//!
//! Layers below the groundwater table stay saturated and do not drain.

use furrow_core::{SoilFluxes, SoilModel, SoilSnapshot};
use furrow_types::{
    MineralFertilizer, OrganicFertilizer, OrganicMatterParameters, SiteParameters, SoilLayer,
    Weather,
};
use serde::Serialize;
use tracing::debug;

/// Millimetres of water per metre of layer at a volumetric content of 1.
const MM_PER_M: f64 = 1000.0;
/// Square metres per hectare.
const M2_PER_HA: f64 = 10_000.0;
/// C:N ratio of humus.
const HUMUS_CN: f64 = 10.0;
/// Daily humus mineralization rate at 20 degrees C.
const HUMUS_RATE: f64 = 4.0e-5;
/// Share of decomposed fresh carbon that ends up as humus.
const HUMIFICATION: f64 = 0.3;
/// Daily nitrification rate at 20 degrees C.
const NITRIFICATION_RATE: f64 = 0.1;
/// Share of drainable water leaving a layer per day.
const DRAINAGE_COEFFICIENT: f64 = 0.5;
/// Rain above this amount (mm) can run off.
const RUNOFF_THRESHOLD: f64 = 10.0;
/// Ammonium lost from surface-applied organic fertilizer.
const VOLATILIZATION: f64 = 0.1;
/// kg N ha-1 per mm of water at 1 mg N l-1.
const KG_N_PER_MM_MG_L: f64 = 0.01;

/// State of one layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayerState {
    /// Depth of the layer's upper boundary (m).
    pub top: f64,
    /// Layer thickness (m).
    pub thickness: f64,
    /// Water (mm).
    pub water: f64,
    /// Water at field capacity (mm).
    pub field_capacity: f64,
    /// Water at the wilting point (mm).
    pub wilting_point: f64,
    /// Water at saturation (mm).
    pub saturation: f64,
    /// Nitrate (kg N ha-1).
    pub nitrate: f64,
    /// Ammonium (kg N ha-1).
    pub ammonium: f64,
    /// Organic carbon content (kg C kg-1 soil).
    pub organic_carbon: f64,
    /// Soil mass (kg ha-1).
    pub soil_mass: f64,
    /// Temperature (degrees C).
    pub temperature: f64,
}

impl LayerState {
    fn from_layer(layer: &SoilLayer, top: f64) -> Self {
        let mm = layer.thickness * MM_PER_M;
        let field_capacity = layer.field_capacity * mm;
        Self {
            top,
            thickness: layer.thickness,
            water: field_capacity * layer.initial_moisture_fraction,
            field_capacity,
            wilting_point: layer.wilting_point * mm,
            saturation: layer.saturation * mm,
            nitrate: layer.initial_nitrate,
            ammonium: layer.initial_ammonium,
            organic_carbon: layer.organic_carbon,
            soil_mass: layer.bulk_density * layer.thickness * M2_PER_HA,
            temperature: 8.0,
        }
    }

    fn bottom(&self) -> f64 {
        self.top + self.thickness
    }

    /// Share of the layer lying between the surface and `depth`.
    fn share_above(&self, depth: f64) -> f64 {
        if self.thickness <= 0.0 {
            return 0.0;
        }
        ((depth - self.top) / self.thickness).clamp(0.0, 1.0)
    }

    fn volumetric_water(&self) -> f64 {
        if self.thickness <= 0.0 {
            return 0.0;
        }
        self.water / (self.thickness * MM_PER_M)
    }

    fn available_water(&self) -> f64 {
        (self.water - self.wilting_point).max(0.0)
    }

    fn mineral_nitrogen(&self) -> f64 {
        self.nitrate + self.ammonium
    }
}

/// Decomposing plant material or organic fertilizer.
#[derive(Debug, Clone, Copy, PartialEq)]
struct FreshMatter {
    layer: usize,
    carbon: f64,
    nitrogen: f64,
    rate: f64,
}

/// Layered bucket soil implementing [`SoilModel`].
#[derive(Debug, Clone)]
pub struct BucketSoil {
    layers: Vec<LayerState>,
    fresh: Vec<FreshMatter>,
    slope: f64,
    transpiration: f64,
}

impl BucketSoil {
    /// Build the column from its layers, top first.
    pub fn new(layers: &[SoilLayer], site: &SiteParameters) -> Self {
        let mut top = 0.0;
        let states = layers
            .iter()
            .map(|layer| {
                let state = LayerState::from_layer(layer, top);
                top = state.bottom();
                state
            })
            .collect();
        Self {
            layers: states,
            fresh: Vec::new(),
            slope: site.slope,
            transpiration: 0.0,
        }
    }

    /// Current layer states, top first.
    pub fn layers(&self) -> &[LayerState] {
        &self.layers
    }

    /// Profile depth (m).
    pub fn depth(&self) -> f64 {
        self.layers.last().map_or(0.0, LayerState::bottom)
    }

    /// Total water in the profile (mm).
    pub fn total_water(&self) -> f64 {
        self.layers.iter().map(|l| l.water).sum()
    }

    /// Total mineral N in the profile (kg N ha-1).
    pub fn total_mineral_nitrogen(&self) -> f64 {
        self.layers.iter().map(LayerState::mineral_nitrogen).sum()
    }

    /// Index of the deepest layer starting above `depth`.
    fn layer_index_at(&self, depth: f64) -> usize {
        self.layers
            .iter()
            .rposition(|l| l.top < depth)
            .unwrap_or(0)
    }

    // -----------------------------------------------------------------------
    // Daily processes
    // -----------------------------------------------------------------------

    fn update_temperature(&mut self, air: f64) {
        for layer in &mut self.layers {
            let mid = layer.top + layer.thickness / 2.0;
            let damping = 0.25 / (1.0 + 2.0 * mid);
            layer.temperature += damping * (air - layer.temperature);
        }
    }

    fn mineralize(&mut self) {
        for pool in &mut self.fresh {
            let Some(layer) = self.layers.get_mut(pool.layer) else {
                continue;
            };
            let decomposed = pool.carbon * pool.rate * temperature_factor(layer.temperature);
            let released_n = if pool.carbon > 0.0 {
                decomposed * pool.nitrogen / pool.carbon
            } else {
                0.0
            };
            pool.carbon -= decomposed;
            pool.nitrogen -= released_n;
            layer.ammonium += released_n;
            if layer.soil_mass > 0.0 {
                layer.organic_carbon += decomposed * HUMIFICATION / layer.soil_mass;
            }
        }
        self.fresh.retain(|p| p.carbon > 1e-6);

        for layer in &mut self.layers {
            let humus_carbon = layer.organic_carbon * layer.soil_mass;
            let mineralized = humus_carbon * HUMUS_RATE * temperature_factor(layer.temperature);
            layer.ammonium += mineralized / HUMUS_CN;
            if layer.soil_mass > 0.0 {
                layer.organic_carbon -= mineralized / layer.soil_mass;
            }

            let nitrified =
                layer.ammonium * (NITRIFICATION_RATE * temperature_factor(layer.temperature)).min(1.0);
            layer.ammonium -= nitrified;
            layer.nitrate += nitrified;
        }
    }

    /// Move water and nitrate through the column. Returns (recharge, leaching).
    fn percolate(&mut self, infiltration: f64, groundwater_depth: f64) -> (f64, f64) {
        let mut water_in = infiltration;
        let mut nitrate_in = 0.0;
        for layer in &mut self.layers {
            if layer.top >= groundwater_depth {
                layer.water = layer.saturation;
                continue;
            }
            layer.water += water_in;
            layer.nitrate += nitrate_in;

            let above_saturation = (layer.water - layer.saturation).max(0.0);
            let drainable = (layer.water - above_saturation - layer.field_capacity).max(0.0);
            let drained = above_saturation + drainable * DRAINAGE_COEFFICIENT;
            let carried = if layer.water > 0.0 {
                layer.nitrate * (drained / layer.water).clamp(0.0, 1.0)
            } else {
                0.0
            };
            layer.water -= drained;
            layer.nitrate -= carried;
            water_in = drained;
            nitrate_in = carried;
        }
        (water_in, nitrate_in)
    }

    fn evaporate(&mut self, potential: f64) -> f64 {
        let Some(top) = self.layers.first_mut() else {
            return 0.0;
        };
        let capacity = (top.field_capacity - top.wilting_point).max(f64::EPSILON);
        let wetness = (top.available_water() / capacity).clamp(0.0, 1.0);
        let evaporation = (potential * wetness).min(top.available_water());
        top.water -= evaporation;
        evaporation
    }

    /// Mean of `value` over `[0, depth]`, weighted by layer thickness.
    fn mean_to_depth(&self, depth: f64, value: impl Fn(&LayerState) -> f64) -> f64 {
        let mut weight = 0.0;
        let mut sum = 0.0;
        for layer in &self.layers {
            let w = layer.share_above(depth) * layer.thickness;
            weight += w;
            sum += w * value(layer);
        }
        if weight > 0.0 { sum / weight } else { 0.0 }
    }

    /// Sum of `value` over `[0, depth]`, prorated by layer share.
    fn sum_to_depth(&self, depth: f64, value: impl Fn(&LayerState) -> f64) -> f64 {
        self.layers
            .iter()
            .map(|l| l.share_above(depth) * value(l))
            .sum()
    }
}

/// Q10-style temperature response, 1 at 20 degrees C, 0 below freezing.
fn temperature_factor(temperature: f64) -> f64 {
    if temperature <= 0.0 {
        return 0.0;
    }
    2.0_f64.powf((temperature - 20.0) / 10.0)
}

impl SoilModel for BucketSoil {
    fn general_step(&mut self, weather: &Weather, groundwater_depth: f64) -> SoilFluxes {
        self.update_temperature(weather.mean_temperature);
        self.mineralize();

        let excess = (weather.precipitation - RUNOFF_THRESHOLD).max(0.0);
        let surface_runoff = excess * (0.1 + self.slope).clamp(0.0, 0.9);
        let infiltration = weather.precipitation - surface_runoff;

        let (groundwater_recharge, nitrogen_leaching) =
            self.percolate(infiltration, groundwater_depth);
        let evaporation = self.evaporate(weather.reference_evapotranspiration * 0.5);
        let actual_evapotranspiration = evaporation + std::mem::take(&mut self.transpiration);

        debug!(
            recharge = groundwater_recharge,
            leaching = nitrogen_leaching,
            runoff = surface_runoff,
            eta = actual_evapotranspiration,
            "Soil step"
        );

        SoilFluxes {
            groundwater_recharge,
            nitrogen_leaching,
            surface_runoff,
            actual_evapotranspiration,
        }
    }

    fn apply_mineral_fertilizer(&mut self, fertilizer: &MineralFertilizer, amount: f64) {
        let Some(top) = self.layers.first_mut() else {
            return;
        };
        top.nitrate += amount * fertilizer.nitrate_fraction;
        top.ammonium += amount * (fertilizer.ammonium_fraction + fertilizer.urea_fraction);
    }

    fn apply_organic_fertilizer(
        &mut self,
        fertilizer: &OrganicFertilizer,
        amount: f64,
        incorporate: bool,
    ) {
        let dry_matter = amount * fertilizer.dry_matter_content;
        let nitrogen = dry_matter * fertilizer.n_concentration;
        let mut ammonium = nitrogen * fertilizer.ammonium_share;
        if !incorporate {
            ammonium *= 1.0 - VOLATILIZATION;
        }
        let layer = if incorporate {
            self.layer_index_at(0.15)
        } else {
            0
        };
        if let Some(target) = self.layers.get_mut(layer) {
            target.ammonium += ammonium;
        }
        self.fresh.push(FreshMatter {
            layer,
            carbon: dry_matter * fertilizer.organic_matter.carbon_content,
            nitrogen: nitrogen * (1.0 - fertilizer.ammonium_share),
            rate: fertilizer.organic_matter.decomposition_rate,
        });
    }

    fn apply_irrigation(&mut self, amount: f64, nitrate_concentration: f64) {
        let Some(top) = self.layers.first_mut() else {
            return;
        };
        top.water += amount;
        top.nitrate += amount * nitrate_concentration * KG_N_PER_MM_MG_L;
    }

    fn apply_tillage(&mut self, depth: f64) {
        let mixed: Vec<usize> = self
            .layers
            .iter()
            .enumerate()
            .filter(|(i, l)| *i == 0 || l.bottom() <= depth + 1e-9)
            .map(|(i, _)| i)
            .collect();
        let total_thickness: f64 = mixed
            .iter()
            .filter_map(|i| self.layers.get(*i))
            .map(|l| l.thickness)
            .sum();
        if mixed.len() < 2 || total_thickness <= 0.0 {
            return;
        }

        let mut nitrate = 0.0;
        let mut ammonium = 0.0;
        let mut carbon = 0.0;
        let mut mass = 0.0;
        let mut temperature = 0.0;
        for layer in mixed.iter().filter_map(|i| self.layers.get(*i)) {
            nitrate += layer.nitrate;
            ammonium += layer.ammonium;
            carbon += layer.organic_carbon * layer.soil_mass;
            mass += layer.soil_mass;
            temperature += layer.temperature * layer.thickness;
        }
        for i in &mixed {
            if let Some(layer) = self.layers.get_mut(*i) {
                let share = layer.thickness / total_thickness;
                layer.nitrate = nitrate * share;
                layer.ammonium = ammonium * share;
                if mass > 0.0 {
                    layer.organic_carbon = carbon / mass;
                }
                layer.temperature = temperature / total_thickness;
            }
        }
        for pool in &mut self.fresh {
            pool.layer = pool.layer.max(mixed.len() / 2);
        }
        debug!(depth, layers = mixed.len(), "Soil tilled");
    }

    fn add_organic_matter(
        &mut self,
        params: &OrganicMatterParameters,
        dry_matter: f64,
        n_concentration: f64,
    ) {
        if dry_matter <= 0.0 {
            return;
        }
        self.fresh.push(FreshMatter {
            layer: 0,
            carbon: dry_matter * params.carbon_content,
            nitrogen: dry_matter * n_concentration,
            rate: params.decomposition_rate,
        });
    }

    fn mineral_nitrogen_to_depth(&self, depth: f64) -> f64 {
        self.sum_to_depth(depth, LayerState::mineral_nitrogen)
    }

    fn available_water_fraction(&self, depth: f64) -> f64 {
        let available = self.sum_to_depth(depth, LayerState::available_water);
        let capacity = self.sum_to_depth(depth, |l| (l.field_capacity - l.wilting_point).max(0.0));
        if capacity > 0.0 {
            (available / capacity).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    fn soil_temperature_to_depth(&self, depth: f64) -> f64 {
        self.mean_to_depth(depth, |l| l.temperature)
    }

    fn is_too_wet_for_fertilizing(&self) -> bool {
        self.layers
            .first()
            .is_some_and(|l| l.water > l.field_capacity)
    }

    fn extract_water(&mut self, demand: f64, root_depth: f64) -> f64 {
        let available = self.sum_to_depth(root_depth, LayerState::available_water);
        if demand <= 0.0 || available <= 0.0 {
            return 0.0;
        }
        let taken = demand.min(available);
        let ratio = taken / available;
        for layer in &mut self.layers {
            let share = layer.share_above(root_depth);
            layer.water -= layer.available_water() * share * ratio;
        }
        self.transpiration += taken;
        taken
    }

    fn extract_nitrogen(&mut self, demand: f64, root_depth: f64) -> f64 {
        let available = self.sum_to_depth(root_depth, LayerState::mineral_nitrogen);
        if demand <= 0.0 || available <= 0.0 {
            return 0.0;
        }
        let taken = demand.min(available);
        let ratio = taken / available;
        for layer in &mut self.layers {
            let share = layer.share_above(root_depth) * ratio;
            layer.nitrate -= layer.nitrate * share;
            layer.ammonium -= layer.ammonium * share;
        }
        taken
    }

    fn snapshot(&self) -> SoilSnapshot {
        SoilSnapshot {
            mineral_nitrogen_0_to_90: self.sum_to_depth(0.9, LayerState::mineral_nitrogen),
            nitrate_0_to_90: self.sum_to_depth(0.9, |l| l.nitrate),
            water_content_0_to_90: self.mean_to_depth(0.9, LayerState::volumetric_water),
            water_content_0_to_30: self.mean_to_depth(0.3, LayerState::volumetric_water),
            organic_carbon_0_to_10: self.mean_to_depth(0.1, |l| l.organic_carbon),
            organic_carbon_0_to_30: self.mean_to_depth(0.3, |l| l.organic_carbon),
            soil_temperature_0_to_30: self.mean_to_depth(0.3, |l| l.temperature),
        }
    }
}
