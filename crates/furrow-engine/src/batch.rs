//! Sequential multi-field batch.
//!
//! Every configured field runs over the same horizon on its own synthetic
//! climate, generated from the shared climate settings and the field's
//! latitude. When a field fails, the configured [`FieldErrorPolicy`]
//! decides whether the batch stops or moves on.

use furrow_core::{
    FieldErrorPolicy, Horizon, ModelFactory, ReferenceData, SimulationConfig, SimulationResult,
    run,
};
use furrow_core::config::{ClimateConfig, FieldConfig};
use furrow_field::ClimateGenerator;
use furrow_types::RunId;
use serde::Serialize;
use tracing::{info, info_span, warn};

use crate::error::EngineError;

/// What happened to one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldOutcome {
    /// Field name.
    pub name: String,
    /// The result, if the field ran to completion.
    pub result: Option<SimulationResult>,
    /// Why the field was skipped.
    pub error: Option<String>,
}

/// Everything a batch produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// Identifier of this batch.
    pub run_id: RunId,
    /// First simulated day.
    pub start: chrono::NaiveDate,
    /// Last simulated day.
    pub end: chrono::NaiveDate,
    /// One entry per configured field, in order.
    pub fields: Vec<FieldOutcome>,
}

impl BatchReport {
    /// Number of fields that ran to completion.
    pub fn completed(&self) -> usize {
        self.fields.iter().filter(|f| f.result.is_some()).count()
    }
}

/// Run every field of `config`.
///
/// # Errors
///
/// Returns [`EngineError::Horizon`] if the configured horizon is invalid,
/// or the first field's error under [`FieldErrorPolicy::Abort`].
pub fn run_batch(
    config: &SimulationConfig,
    reference: &ReferenceData,
    factory: &dyn ModelFactory,
) -> Result<BatchReport, EngineError> {
    let horizon = Horizon::new(config.simulation.start, config.simulation.end)
        .map_err(|source| EngineError::Horizon { source })?;
    let run_id = RunId::new();
    let span = info_span!("batch", run_id = %run_id);
    let _guard = span.enter();

    info!(
        fields = config.fields.len(),
        start = %horizon.start(),
        end = %horizon.end(),
        days = horizon.days(),
        policy = ?config.simulation.on_field_error,
        "Batch started"
    );

    let mut fields = Vec::with_capacity(config.fields.len());
    for field in &config.fields {
        match run_field(field, horizon, config.climate, reference, factory) {
            Ok(result) => fields.push(FieldOutcome {
                name: field.name.clone(),
                result: Some(result),
                error: None,
            }),
            Err(e) => match config.simulation.on_field_error {
                FieldErrorPolicy::Abort => return Err(e),
                FieldErrorPolicy::Skip => {
                    warn!(field = %field.name, error = %e, "Field failed, skipping");
                    fields.push(FieldOutcome {
                        name: field.name.clone(),
                        result: None,
                        error: Some(e.to_string()),
                    });
                }
            },
        }
    }

    let report = BatchReport {
        run_id,
        start: horizon.start(),
        end: horizon.end(),
        fields,
    };
    info!(
        completed = report.completed(),
        skipped = report.fields.len().saturating_sub(report.completed()),
        "Batch finished"
    );
    Ok(report)
}

fn run_field(
    field: &FieldConfig,
    horizon: Horizon,
    climate: ClimateConfig,
    reference: &ReferenceData,
    factory: &dyn ModelFactory,
) -> Result<SimulationResult, EngineError> {
    let weather = ClimateGenerator::new(climate, field.site.latitude)
        .map_err(|source| EngineError::Climate {
            field: field.name.clone(),
            source,
        })?
        .generate(&horizon);
    run(field, horizon, &weather, reference, factory).map_err(|source| EngineError::Run {
        field: field.name.clone(),
        source,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use furrow_field::FieldModels;

    const BATCH: &str = r#"
simulation:
  start: 2021-01-01
  end: 2021-12-31
  on_field_error: POLICY
fields:
  - name: good
    soil: [{}, {}, {}]
    rotation:
      - name: barley
        worksteps:
          - { date: "04-01", type: seed, crop: SB }
          - { date: "08-01", type: harvest }
  - name: bad
    soil: [{}]
    rotation:
      - name: unknown
        worksteps:
          - { date: "04-01", type: seed, crop: XX }
          - { date: "08-01", type: harvest }
  - name: also-good
    soil: [{}]
    rotation:
      - name: fallow
        worksteps:
          - { date: "05-01", type: tillage }
"#;

    fn config(policy: &str) -> SimulationConfig {
        SimulationConfig::parse(&BATCH.replace("POLICY", policy)).unwrap()
    }

    #[test]
    fn skip_policy_records_the_failure_and_continues() {
        let report =
            run_batch(&config("skip"), &ReferenceData::builtin(), &FieldModels).unwrap();
        assert_eq!(report.fields.len(), 3);
        assert_eq!(report.completed(), 2);
        assert!(report.fields[1].result.is_none());
        assert!(report.fields[1].error.as_deref().unwrap().contains("bad"));
        let good = report.fields[0].result.as_ref().unwrap();
        assert_eq!(good.dates.len(), 365);
        assert_eq!(good.cycles.len(), 1);
    }

    #[test]
    fn abort_policy_stops_at_the_first_failure() {
        let err = run_batch(&config("abort"), &ReferenceData::builtin(), &FieldModels)
            .unwrap_err();
        assert!(matches!(err, EngineError::Run { field, .. } if field == "bad"));
    }

    #[test]
    fn reversed_horizon_fails_before_any_field() {
        let mut config = config("skip");
        config.simulation.end = config.simulation.start.pred_opt().unwrap();
        assert!(matches!(
            run_batch(&config, &ReferenceData::builtin(), &FieldModels),
            Err(EngineError::Horizon { .. })
        ));
    }

    #[test]
    fn invalid_latitude_is_a_field_error() {
        let mut config = config("skip");
        config.fields[0].site.latitude = 120.0;
        let report = run_batch(&config, &ReferenceData::builtin(), &FieldModels).unwrap();
        assert!(report.fields[0].error.as_deref().unwrap().contains("latitude"));
    }
}
