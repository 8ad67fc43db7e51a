//! Synthetic daily climate.
//!
//! Generates one [`Weather`] record per day of a [`Horizon`] from a handful
//! of site statistics, for runs without measured climate data.
//!
//! # Generation
//!
//! | Quantity          | Model                                                  |
//! |-------------------|--------------------------------------------------------|
//! | Mean temperature  | annual sine peaking mid-July, plus uniform noise ±2 C  |
//! | Min / max         | mean ∓ half the diurnal range                          |
//! | Wet day           | Bernoulli with the configured probability              |
//! | Precipitation     | exponential amount on wet days                         |
//! | Radiation         | share of extraterrestrial radiation, lower on wet days |
//! | ET0               | Hargreaves from temperature and radiation              |
//!
//! Extraterrestrial radiation follows the FAO-56 formulation from latitude
//! and day of year.
//!
//! # Determinism
//!
//! The generator is a `StdRng` seeded from the configured seed. The same
//! seed, latitude and horizon always produce the same series.

use std::f64::consts::PI;

use chrono::Datelike;
use furrow_core::Horizon;
use furrow_core::config::ClimateConfig;
use furrow_types::Weather;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Solar constant (MJ m-2 min-1).
const SOLAR_CONSTANT: f64 = 0.0820;
/// Day of year of the coldest point of the temperature sine.
const COLDEST_DAY_OFFSET: f64 = 105.0;
/// Amplitude of the daily temperature noise (degrees C).
const TEMPERATURE_NOISE: f64 = 2.0;
/// Radiation share of a dry day.
const DRY_DAY_TRANSMISSIVITY: f64 = 0.5;
/// Radiation share of a wet day.
const WET_DAY_TRANSMISSIVITY: f64 = 0.3;
/// Converts MJ m-2 d-1 to mm d-1 of evaporated water.
const MJ_TO_MM: f64 = 0.408;

/// Errors from invalid climate statistics.
#[derive(Debug, thiserror::Error)]
pub enum ClimateError {
    /// The wet day probability is outside (0, 1].
    #[error("wet day probability must be in (0, 1], got {value}")]
    WetDayProbability {
        /// The configured probability.
        value: f64,
    },

    /// A quantity that cannot be negative is.
    #[error("{name} must not be negative, got {value}")]
    Negative {
        /// Parameter name.
        name: &'static str,
        /// The configured value.
        value: f64,
    },

    /// Latitude outside -90..=90.
    #[error("latitude must be within -90..=90, got {value}")]
    Latitude {
        /// The configured latitude.
        value: f64,
    },
}

/// Seeded generator of daily weather for one site.
#[derive(Debug, Clone)]
pub struct ClimateGenerator {
    config: ClimateConfig,
    latitude: f64,
    rng: StdRng,
}

impl ClimateGenerator {
    /// Build a generator for a site at `latitude` degrees.
    ///
    /// # Errors
    ///
    /// Returns [`ClimateError`] if the statistics are out of range.
    pub fn new(config: ClimateConfig, latitude: f64) -> Result<Self, ClimateError> {
        if !(config.wet_day_probability > 0.0 && config.wet_day_probability <= 1.0) {
            return Err(ClimateError::WetDayProbability {
                value: config.wet_day_probability,
            });
        }
        for (name, value) in [
            ("annual_precipitation", config.annual_precipitation),
            ("diurnal_range", config.diurnal_range),
            ("temperature_amplitude", config.temperature_amplitude),
        ] {
            if value < 0.0 {
                return Err(ClimateError::Negative { name, value });
            }
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(ClimateError::Latitude { value: latitude });
        }
        Ok(Self {
            config,
            latitude,
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    /// One weather record per day of `horizon`.
    pub fn generate(&mut self, horizon: &Horizon) -> Vec<Weather> {
        let climate: Vec<Weather> = horizon
            .dates()
            .map(|date| self.day(date.ordinal()))
            .collect();
        debug!(
            seed = self.config.seed,
            days = climate.len(),
            precipitation = climate.iter().map(|w| w.precipitation).sum::<f64>(),
            "Climate generated"
        );
        climate
    }

    fn day(&mut self, day_of_year: u32) -> Weather {
        let doy = f64::from(day_of_year);
        let season = (2.0 * PI * (doy - COLDEST_DAY_OFFSET) / 365.0).sin();
        let noise = self.rng.random_range(-TEMPERATURE_NOISE..=TEMPERATURE_NOISE);
        let mean_temperature = season.mul_add(
            self.config.temperature_amplitude,
            self.config.mean_temperature,
        ) + noise;
        let half_range = self.config.diurnal_range / 2.0;
        let min_temperature = mean_temperature - half_range;
        let max_temperature = mean_temperature + half_range;

        let wet = self.rng.random::<f64>() < self.config.wet_day_probability;
        let precipitation = if wet {
            let mean_amount =
                self.config.annual_precipitation / (365.0 * self.config.wet_day_probability);
            // inverse CDF of the exponential distribution
            let u: f64 = self.rng.random();
            -mean_amount * (1.0 - u).ln()
        } else {
            0.0
        };

        let ra = extraterrestrial_radiation(self.latitude, doy);
        let global_radiation = ra
            * if wet {
                WET_DAY_TRANSMISSIVITY
            } else {
                DRY_DAY_TRANSMISSIVITY
            };
        let reference_evapotranspiration =
            hargreaves(mean_temperature, min_temperature, max_temperature, ra);

        Weather {
            min_temperature,
            mean_temperature,
            max_temperature,
            precipitation,
            global_radiation,
            reference_evapotranspiration,
        }
    }
}

/// Extraterrestrial radiation (MJ m-2 d-1) at `latitude` degrees.
pub fn extraterrestrial_radiation(latitude: f64, day_of_year: f64) -> f64 {
    let phi = latitude.to_radians();
    let dr = 0.033f64.mul_add((2.0 * PI * day_of_year / 365.0).cos(), 1.0);
    let delta = 0.409 * (2.0 * PI * day_of_year / 365.0 - 1.39).sin();
    let omega = (-phi.tan() * delta.tan()).clamp(-1.0, 1.0).acos();
    let ra = 24.0 * 60.0 / PI
        * SOLAR_CONSTANT
        * dr
        * (omega * phi.sin()).mul_add(delta.sin(), phi.cos() * delta.cos() * omega.sin());
    ra.max(0.0)
}

/// Hargreaves reference evapotranspiration (mm d-1).
fn hargreaves(mean: f64, min: f64, max: f64, ra: f64) -> f64 {
    let et0 = 0.0023 * (mean + 17.8) * (max - min).max(0.0).sqrt() * ra * MJ_TO_MM;
    et0.max(0.0)
}
