//! Batch summary logging and JSON export.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use furrow_types::CropMetric;
use tracing::info;

use crate::batch::BatchReport;
use crate::error::EngineError;

/// Log one line per field and one per harvested cycle.
pub fn log_summary(report: &BatchReport) {
    for field in &report.fields {
        let Some(result) = &field.result else {
            info!(field = %field.name, error = ?field.error, "Field skipped");
            continue;
        };
        info!(
            field = %field.name,
            days = result.dates.len(),
            cycles = result.cycles.len(),
            occurrences = result.occurrences.len(),
            "Field summary"
        );
        for cycle in &result.cycles {
            let metric = |m: CropMetric| cycle.metrics.get(&m).copied().unwrap_or_default();
            info!(
                field = %field.name,
                process = %cycle.process,
                start = %cycle.start,
                end = %cycle.end,
                primary_yield = metric(CropMetric::PrimaryYield),
                biomass = metric(CropMetric::AboveGroundBiomass),
                fertilizer = metric(CropMetric::SumFertilizer),
                irrigation = metric(CropMetric::SumIrrigation),
                "Cycle"
            );
        }
    }
}

/// Write the report as pretty JSON to `<dir>/<run_id>.json`.
///
/// # Errors
///
/// Returns [`EngineError::Io`] if the directory or file cannot be written,
/// or [`EngineError::Json`] if serialization fails.
pub fn write_report(report: &BatchReport, dir: &Path) -> Result<PathBuf, EngineError> {
    fs::create_dir_all(dir).map_err(|source| EngineError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(format!("{}.json", report.run_id));
    let io_error = |source: std::io::Error| EngineError::Io {
        path: path.clone(),
        source,
    };

    let file = File::create(&path).map_err(io_error)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.flush().map_err(io_error)?;

    info!(path = %path.display(), "Results written");
    Ok(path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::batch::FieldOutcome;
    use chrono::NaiveDate;
    use furrow_core::SimulationResult;
    use furrow_types::RunId;

    #[test]
    fn report_is_written_as_json() {
        let report = BatchReport {
            run_id: RunId::new(),
            start: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2021, 12, 31).unwrap(),
            fields: vec![
                FieldOutcome {
                    name: "north".to_owned(),
                    result: Some(SimulationResult::default()),
                    error: None,
                },
                FieldOutcome {
                    name: "south".to_owned(),
                    result: None,
                    error: Some("unknown crop".to_owned()),
                },
            ],
        };
        let dir = std::env::temp_dir().join(format!("furrow-report-{}", report.run_id));
        let path = write_report(&report, &dir).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["run_id"], report.run_id.to_string());
        assert_eq!(written["start"], "2021-01-01");
        assert_eq!(written["fields"][1]["error"], "unknown crop");
        assert!(written["fields"][1]["result"].is_null());

        fs::remove_dir_all(dir).unwrap();
    }
}
