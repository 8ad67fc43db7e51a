//! Batch driver binary for the Furrow field simulation.
//!
//! Loads the configuration, runs every configured field on synthetic
//! climate with the reference soil and crop models, logs a summary and
//! writes the results as JSON.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `FURROW_CONFIG` or `furrow-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Load reference data (file or built-in table)
//! 4. Run the fields in order
//! 5. Log the summary and write the results

mod batch;
mod error;
mod report;

use std::path::{Path, PathBuf};

use furrow_core::config::LoggingConfig;
use furrow_core::{ReferenceData, SimulationConfig};
use furrow_field::FieldModels;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Config file used when `FURROW_CONFIG` is not set.
const DEFAULT_CONFIG_PATH: &str = "furrow-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, reference data, a field run under the
/// abort policy, or the result export fails.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, config_path) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!("furrow-engine starting");
    match &config_path {
        Some(path) => info!(
            path = %path.display(),
            fields = config.fields.len(),
            start = %config.simulation.start,
            end = %config.simulation.end,
            "Configuration loaded"
        ),
        None => info!("Config file not found, using defaults"),
    }

    // 3. Load reference data.
    let reference = load_reference(&config)?;
    info!(crops = reference.crop_count(), "Reference data loaded");

    // 4. Run the fields.
    let report = batch::run_batch(&config, &reference, &FieldModels)?;

    // 5. Summarize and export.
    report::log_summary(&report);
    let path = report::write_report(&report, Path::new(&config.simulation.output_dir))?;

    info!(
        run_id = %report.run_id,
        completed = report.completed(),
        path = %path.display(),
        "furrow-engine shutdown complete"
    );
    Ok(())
}

/// Load the configuration.
///
/// An explicit `FURROW_CONFIG` path must exist. Without it,
/// `furrow-config.yaml` in the working directory is used if present, and
/// the defaults otherwise.
fn load_config() -> Result<(SimulationConfig, Option<PathBuf>), EngineError> {
    if let Ok(path) = std::env::var("FURROW_CONFIG") {
        let path = PathBuf::from(path);
        let config = SimulationConfig::from_file(&path)?;
        return Ok((config, Some(path)));
    }
    let path = PathBuf::from(DEFAULT_CONFIG_PATH);
    if path.exists() {
        let config = SimulationConfig::from_file(&path)?;
        Ok((config, Some(path)))
    } else {
        Ok((SimulationConfig::default(), None))
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Reference data from the configured file, or the built-in table.
fn load_reference(config: &SimulationConfig) -> Result<ReferenceData, EngineError> {
    match &config.reference_data {
        Some(path) => Ok(ReferenceData::from_file(Path::new(path))?),
        None => Ok(ReferenceData::builtin()),
    }
}
