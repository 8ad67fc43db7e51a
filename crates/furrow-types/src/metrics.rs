//! Keys for recorded results.
//!
//! [`CropMetric`] names the values in a per-cycle record. [`SeriesMetric`]
//! names the time-indexed series, which are grouped by [`Granularity`].

use serde::{Deserialize, Serialize};

/// A value recorded once per completed crop cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropMetric {
    /// Primary (marketable) yield, kg fresh matter ha-1.
    PrimaryYield,
    /// Secondary yield (straw, leaves), kg fresh matter ha-1.
    SecondaryYield,
    /// Above-ground biomass at harvest, kg dry matter ha-1.
    AboveGroundBiomass,
    /// Root biomass at harvest, kg dry matter ha-1.
    RootBiomass,
    /// Nitrogen concentration of the primary yield, kg N kg-1.
    PrimaryYieldNConcentration,
    /// Nitrogen concentration of the above-ground biomass, kg N kg-1.
    AboveGroundBiomassNConcentration,
    /// Total nitrogen taken up by the crop, kg N ha-1.
    SumNitrogenUptake,
    /// Irrigation applied while the crop was growing, mm.
    SumIrrigation,
    /// Mineral N fertilizer applied during the cycle, kg N ha-1.
    SumFertilizer,
    /// Above-ground biomass removed by cutting, kg dry matter ha-1.
    CutBiomass,
    /// Days the crop was stepped.
    DaysWithCrop,
    /// Accumulated nitrogen stress (sum of daily 1 - factor).
    NitrogenStress,
    /// Accumulated water stress (sum of daily 1 - factor).
    WaterStress,
    /// Accumulated heat stress (sum of daily 1 - factor).
    HeatStress,
    /// Accumulated oxygen stress (sum of daily 1 - factor).
    OxygenStress,
    /// Mineral nitrogen in 0 to 90 cm on the harvest day, kg N ha-1.
    MineralNitrogen0To90AtHarvest,
    /// Mean volumetric water content in 0 to 90 cm on the harvest day.
    WaterContent0To90AtHarvest,
    /// Mean organic carbon in 0 to 30 cm on the harvest day, kg C kg-1.
    OrganicCarbon0To30AtHarvest,
}

/// A time-indexed result series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesMetric {
    /// Crop development stage (0 without a crop, stage + 1 otherwise).
    DevelopmentStage,
    /// Mineral fertilizer nitrogen applied, kg N ha-1.
    Fertilizer,
    /// Irrigation water applied, mm.
    Irrigation,
    /// Water leaving the bottom of the profile, mm.
    GroundwaterRecharge,
    /// Nitrate leaving the bottom of the profile, kg N ha-1.
    NitrogenLeaching,
    /// Surface runoff, mm.
    SurfaceRunoff,
    /// Precipitation, mm.
    Precipitation,
    /// Actual evapotranspiration, mm.
    ActualEvapotranspiration,
    /// Mean organic carbon in 0 to 10 cm, kg C kg-1.
    OrganicCarbon0To10,
    /// Mean organic carbon in 0 to 30 cm, kg C kg-1.
    OrganicCarbon0To30,
    /// Mean volumetric water content in 0 to 90 cm.
    WaterContent0To90,
    /// Mineral nitrogen in 0 to 90 cm on March 31, kg N ha-1.
    MineralNitrogen0To90AtMarch31,
    /// Nitrate in 0 to 90 cm on March 31, kg N ha-1.
    Nitrate0To90AtMarch31,
    /// Mean soil temperature in 0 to 30 cm on March 31, degrees C.
    SoilTemperature0To30AtMarch31,
    /// Mean volumetric water content in 0 to 30 cm on March 31.
    WaterContent0To30AtMarch31,
}

/// Time window of a series entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// One entry per simulated day.
    Daily,
    /// One entry per calendar month touched by the run.
    Monthly,
    /// One entry per complete calendar year.
    Yearly,
}
