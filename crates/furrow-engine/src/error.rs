//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps every failure
//! mode of startup, the field runs and the result export.

use std::path::PathBuf;

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: furrow_core::ConfigError,
    },

    /// Reference data could not be loaded.
    #[error("reference data error: {source}")]
    Reference {
        /// The underlying reference error.
        #[from]
        source: furrow_core::ReferenceError,
    },

    /// The simulation horizon is invalid.
    #[error("horizon error: {source}")]
    Horizon {
        /// The underlying run error.
        source: furrow_core::RunError,
    },

    /// The synthetic climate could not be generated for a field.
    #[error("field {field}: climate error: {source}")]
    Climate {
        /// Field name.
        field: String,
        /// The underlying climate error.
        source: furrow_field::ClimateError,
    },

    /// A field run failed.
    #[error("field {field}: {source}")]
    Run {
        /// Field name.
        field: String,
        /// The underlying run error.
        source: furrow_core::RunError,
    },

    /// Writing results failed.
    #[error("failed to write {}: {source}", path.display())]
    Io {
        /// Output path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Serializing results failed.
    #[error("failed to serialize results: {source}")]
    Json {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}
