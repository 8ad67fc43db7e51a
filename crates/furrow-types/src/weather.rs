//! Daily weather records.

use serde::{Deserialize, Serialize};

/// Weather for one simulated day.
///
/// The climate series passed to a run holds exactly one record per day of
/// the simulation horizon, in date order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    /// Daily minimum air temperature (degrees C).
    pub min_temperature: f64,
    /// Daily mean air temperature (degrees C).
    pub mean_temperature: f64,
    /// Daily maximum air temperature (degrees C).
    pub max_temperature: f64,
    /// Precipitation (mm).
    pub precipitation: f64,
    /// Global radiation (MJ m-2 d-1).
    pub global_radiation: f64,
    /// Reference evapotranspiration (mm).
    pub reference_evapotranspiration: f64,
}

impl Weather {
    /// A dry, mild day. Handy as a neutral input.
    pub const fn mild() -> Self {
        Self {
            min_temperature: 6.0,
            mean_temperature: 11.0,
            max_temperature: 16.0,
            precipitation: 0.0,
            global_radiation: 12.0,
            reference_evapotranspiration: 2.0,
        }
    }
}
