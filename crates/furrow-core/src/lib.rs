//! Calendar, rotation, crop lifecycle and daily stepping for the Furrow
//! field simulation.
//!
//! This crate owns the temporal orchestration of a field run: which
//! operation is due on which day, what happens to the field when it is
//! applied, the autonomous triggers that add operations of their own, and
//! the aggregation of everything a run produces. The physical soil and crop
//! models are collaborators behind the traits in [`collaborators`].
//!
//! # Modules
//!
//! - [`aggregate`] -- Daily, monthly and yearly series and per-cycle records.
//! - [`calendar`] -- Leap-year policy and relative date resolution with year
//!   rollover.
//! - [`collaborators`] -- [`SoilModel`], [`CropGrowth`] and [`ModelFactory`].
//! - [`config`] -- Configuration loading from `furrow-config.yaml`.
//! - [`environment`] -- Groundwater depth and atmospheric CO2 for a date.
//! - [`field`] -- Operation dispatch and the daily crop and soil steps.
//! - [`lifecycle`] -- The single planting of a field.
//! - [`operation`] -- The closed set of farm operations.
//! - [`process`] -- Production processes and their dated schedules.
//! - [`reference`] -- Crop and fertilizer reference data.
//! - [`rotation`] -- The rotation cycle controller.
//! - [`runner`] -- [`run`](runner::run) and [`Simulation`].
//! - [`step`] -- One simulated day.
//! - [`triggers`] -- N-min fertilization, irrigation, automatic sowing and
//!   harvest triggers.
//!
//! [`SoilModel`]: collaborators::SoilModel
//! [`CropGrowth`]: collaborators::CropGrowth
//! [`ModelFactory`]: collaborators::ModelFactory
//! [`Simulation`]: runner::Simulation

pub mod aggregate;
pub mod calendar;
pub mod collaborators;
pub mod config;
pub mod environment;
pub mod field;
pub mod lifecycle;
pub mod operation;
pub mod process;
pub mod reference;
pub mod rotation;
pub mod runner;
pub mod step;
pub mod triggers;

pub use aggregate::{DayRecord, ResultAggregator, SeriesPoint, SimulationResult};
pub use calendar::{Calendar, CalendarError};
pub use collaborators::{
    CropGrowth, ModelFactory, SoilFluxes, SoilModel, SoilSnapshot, StressFactors,
};
pub use config::{ConfigError, FieldConfig, FieldErrorPolicy, SimulationConfig};
pub use reference::{ReferenceData, ReferenceError};
pub use rotation::{Occurrence, RotationError, RotationState};
pub use runner::{DayCallback, Horizon, NoOpCallback, RunError, Simulation, run};
pub use step::{DayError, DaySummary, SimulationState};
