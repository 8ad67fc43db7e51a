//! Shared type definitions for the Furrow field simulation.
//!
//! Every crate in the workspace speaks in these types: schedule dates,
//! weather records, reference-data codes, result keys and the agronomic
//! parameter records.
//!
//! # Modules
//!
//! - [`date`] -- Absolute and relative schedule dates, leap-year policy
//! - [`ids`] -- Reference-data codes, planting and run identifiers
//! - [`metrics`] -- Keys of per-cycle records and time series
//! - [`params`] -- Crop, fertilizer, site, soil and automation parameters
//! - [`weather`] -- Daily weather record
//! - [`worksteps`] -- Management steps as configured

pub mod date;
pub mod ids;
pub mod metrics;
pub mod params;
pub mod weather;
pub mod worksteps;

pub use date::{DateParseError, LeapYearPolicy, RelativeDate, SimDate};
pub use ids::{CropId, MineralFertilizerId, OrganicFertilizerId, PlantingId, RunId};
pub use metrics::{CropMetric, Granularity, SeriesMetric};
pub use params::{
    AutoIrrigationParameters, CropGrowthParameters, CropParameters, GroundwaterParameters,
    IrrigationWindow, MineralFertilizer, NMinCropParameters, NMinUserParameters,
    OrganicFertilizer, OrganicMatterParameters, SiteParameters, SoilLayer,
};
pub use weather::Weather;
pub use worksteps::{
    HarvestConditions, HarvestTime, SoilTemperatureCondition, SowingConditions, WorkStepConfig,
    WorkStepKind,
};
