//! Reference soil, crop and climate models for the Furrow field simulation.
//!
//! `furrow-core` decides when things happen on a field; this crate supplies
//! simple physical models so a run has something to drive:
//!
//! - [`soil`] -- [`BucketSoil`], a layered water and nitrogen bucket model.
//! - [`crop`] -- [`ThermalCrop`], thermal-time phenology with
//!   radiation-driven growth.
//! - [`climate`] -- [`ClimateGenerator`], seeded synthetic daily weather.
//! - [`factory`] -- [`FieldModels`], the [`ModelFactory`] tying the soil
//!   and crop models together.
//!
//! The models are deliberately coarse. They respond to weather, fertilizer,
//! irrigation and tillage in the right direction, but are not calibrated.
//!
//! [`ModelFactory`]: furrow_core::ModelFactory

pub mod climate;
pub mod crop;
pub mod factory;
pub mod soil;

pub use climate::{ClimateError, ClimateGenerator};
pub use crop::ThermalCrop;
pub use factory::FieldModels;
pub use soil::{BucketSoil, LayerState};
