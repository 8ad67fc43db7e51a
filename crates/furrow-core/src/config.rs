//! Configuration loading and typed config structures for Furrow.
//!
//! The canonical configuration lives in `furrow-config.yaml` at the project
//! root. It describes the simulation horizon, the synthetic climate, the
//! reference data source and one or more fields with their soil profile,
//! automation settings and crop rotation.

use std::path::Path;

use chrono::NaiveDate;
use furrow_types::{
    AutoIrrigationParameters, LeapYearPolicy, MineralFertilizerId, NMinUserParameters,
    SiteParameters, SoilLayer, WorkStepConfig,
};
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
///
/// Mirrors the structure of `furrow-config.yaml`. Every section has
/// defaults, so an empty file is a valid (field-less) configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Horizon and batch behavior.
    #[serde(default)]
    pub simulation: SimulationSettings,

    /// Synthetic climate generator settings.
    #[serde(default)]
    pub climate: ClimateConfig,

    /// Path of a reference data YAML file; the built-in table otherwise.
    #[serde(default)]
    pub reference_data: Option<String>,

    /// Fields to simulate, in order.
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_owned()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// What the batch driver does when one field fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorPolicy {
    /// Stop the batch at the first failing field.
    #[default]
    Abort,
    /// Log the failure and continue with the next field.
    Skip,
}

/// Horizon and batch settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationSettings {
    /// First simulated day.
    #[serde(default = "default_start")]
    pub start: NaiveDate,

    /// Last simulated day (inclusive).
    #[serde(default = "default_end")]
    pub end: NaiveDate,

    /// Behavior when a field fails.
    #[serde(default)]
    pub on_field_error: FieldErrorPolicy,

    /// Directory results are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default()
}

fn default_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 12, 31).unwrap_or_default()
}

fn default_output_dir() -> String {
    "results".to_owned()
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            start: default_start(),
            end: default_end(),
            on_field_error: FieldErrorPolicy::default(),
            output_dir: default_output_dir(),
        }
    }
}

/// Settings of the synthetic climate generator.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ClimateConfig {
    /// Seed of the generator. Same seed, same weather.
    #[serde(default = "default_climate_seed")]
    pub seed: u64,

    /// Annual mean air temperature (degrees C).
    #[serde(default = "default_mean_temperature")]
    pub mean_temperature: f64,

    /// Half the difference between the warmest and coldest day (degrees C).
    #[serde(default = "default_temperature_amplitude")]
    pub temperature_amplitude: f64,

    /// Mean diurnal range (degrees C).
    #[serde(default = "default_diurnal_range")]
    pub diurnal_range: f64,

    /// Expected annual precipitation (mm).
    #[serde(default = "default_annual_precipitation")]
    pub annual_precipitation: f64,

    /// Probability of a wet day.
    #[serde(default = "default_wet_day_probability")]
    pub wet_day_probability: f64,
}

const fn default_climate_seed() -> u64 {
    42
}

const fn default_mean_temperature() -> f64 {
    9.5
}

const fn default_temperature_amplitude() -> f64 {
    9.0
}

const fn default_diurnal_range() -> f64 {
    8.0
}

const fn default_annual_precipitation() -> f64 {
    600.0
}

const fn default_wet_day_probability() -> f64 {
    0.45
}

impl Default for ClimateConfig {
    fn default() -> Self {
        Self {
            seed: default_climate_seed(),
            mean_temperature: default_mean_temperature(),
            temperature_amplitude: default_temperature_amplitude(),
            diurnal_range: default_diurnal_range(),
            annual_precipitation: default_annual_precipitation(),
            wet_day_probability: default_wet_day_probability(),
        }
    }
}

/// One field: where it is, what its soil looks like, how it is managed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldConfig {
    /// Field name, used in logs and output file names.
    pub name: String,

    /// Site parameters.
    #[serde(default)]
    pub site: SiteParameters,

    /// Soil layers from the surface down.
    #[serde(default)]
    pub soil: Vec<SoilLayer>,

    /// Leap-year policy of this field's calendar.
    #[serde(default)]
    pub leap_year_policy: LeapYearPolicy,

    /// Whether secondary yield products (straw) leave the field.
    #[serde(default = "default_true")]
    pub use_secondary_yields: bool,

    /// N-min fertilization settings.
    #[serde(default)]
    pub nmin: NMinConfig,

    /// Automatic irrigation settings.
    #[serde(default)]
    pub auto_irrigation: AutoIrrigationConfig,

    /// Production processes, cycled in order.
    #[serde(default)]
    pub rotation: Vec<ProcessConfig>,
}

const fn default_true() -> bool {
    true
}

/// N-min method switch and parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NMinConfig {
    /// Fertilize by the N-min method.
    #[serde(default)]
    pub enabled: bool,

    /// Mineral fertilizer used for N-min doses.
    #[serde(default = "default_nmin_fertilizer")]
    pub fertilizer: MineralFertilizerId,

    /// Dose bounds, delay and winter-crop day.
    #[serde(flatten)]
    pub params: NMinUserParameters,
}

fn default_nmin_fertilizer() -> MineralFertilizerId {
    MineralFertilizerId::new("CAN")
}

impl Default for NMinConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            fertilizer: default_nmin_fertilizer(),
            params: NMinUserParameters::default(),
        }
    }
}

/// Automatic irrigation switch and parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct AutoIrrigationConfig {
    /// Irrigate by soil moisture.
    #[serde(default)]
    pub enabled: bool,

    /// Trigger parameters.
    #[serde(flatten)]
    pub params: AutoIrrigationParameters,
}

/// A named production process.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProcessConfig {
    /// Process name.
    pub name: String,

    /// Dated worksteps.
    pub worksteps: Vec<WorkStepConfig>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = SimulationConfig::parse("{}").unwrap();
        assert_eq!(config, SimulationConfig::default());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.simulation.on_field_error, FieldErrorPolicy::Abort);
        assert!(config.fields.is_empty());
    }

    #[test]
    fn parses_a_field() {
        let yaml = r#"
simulation:
  start: 2020-01-01
  end: 2022-12-31
  on_field_error: skip
fields:
  - name: north
    leap_year_policy: ignore_leap_days
    soil:
      - { thickness: 0.3 }
      - { thickness: 0.3, organic_carbon: 0.008 }
    nmin:
      enabled: true
      max: 80
    auto_irrigation:
      enabled: true
      threshold: 0.3
    rotation:
      - name: wheat
        worksteps:
          - { date: "09-20", type: seed, crop: WW }
          - { date: "+1:07-31", type: harvest }
"#;
        let config = SimulationConfig::parse(yaml).unwrap();
        assert_eq!(config.simulation.on_field_error, FieldErrorPolicy::Skip);
        let field = &config.fields[0];
        assert_eq!(field.leap_year_policy, LeapYearPolicy::IgnoreLeapDays);
        assert_eq!(field.soil.len(), 2);
        assert!(field.nmin.enabled);
        assert!((field.nmin.params.max - 80.0).abs() < f64::EPSILON);
        assert!((field.nmin.params.min - 10.0).abs() < f64::EPSILON);
        assert_eq!(field.nmin.fertilizer, MineralFertilizerId::new("CAN"));
        assert!((field.auto_irrigation.params.threshold - 0.3).abs() < f64::EPSILON);
        assert!((field.auto_irrigation.params.amount - 17.0).abs() < f64::EPSILON);
        assert_eq!(field.rotation[0].worksteps.len(), 2);
        assert!(field.use_secondary_yields);
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        assert!(matches!(
            SimulationConfig::parse("fields: [ {"),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("furrow-config.yaml");
        if path.exists() {
            let config = SimulationConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
