//! Production processes: one crop (or fallow period) and its dated
//! operations.
//!
//! A process is an ordered multimap from schedule date to operations. The
//! rotation controller walks its dates in order, asks it to apply the
//! operations due on a date, and finally asks it for the cycle record of the
//! completed occurrence. The process then resets itself for the next cycle.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use furrow_types::{CropId, CropMetric, PlantingId, SimDate, WorkStepConfig, WorkStepKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::field::{FieldModel, OperationContext, OperationOutcome};
use crate::lifecycle::CycleOutcome;
use crate::operation::{CropPlan, HarvestTrigger, Operation};
use crate::reference::{ReferenceData, ReferenceError};

/// Errors that can occur while building a production process.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// The process has no worksteps.
    #[error("process `{process}` has no worksteps")]
    Empty {
        /// Process name.
        process: String,
    },

    /// A harvest or cutting step without a seed step.
    #[error("process `{process}` harvests or cuts without sowing a crop")]
    HarvestWithoutSeed {
        /// Process name.
        process: String,
    },

    /// More than one seed step.
    #[error("process `{process}` sows more than one crop")]
    MultipleSeeds {
        /// Process name.
        process: String,
    },

    /// An automatic sowing whose latest date lies before its first date.
    #[error("process `{process}`: sowing window closes on {latest} before it opens on {earliest}")]
    SowingWindow {
        /// Process name.
        process: String,
        /// First day of the window.
        earliest: SimDate,
        /// Last day of the window.
        latest: SimDate,
    },

    /// A workstep names an unknown reference-data code.
    #[error("process `{process}`: {source}")]
    Reference {
        /// Process name.
        process: String,
        /// The failed lookup.
        source: ReferenceError,
    },
}

/// Result of one completed, non-fallow process occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    /// Process name.
    pub process: String,
    /// Crop of the process.
    pub crop: Option<CropId>,
    /// Date the occurrence started.
    pub start: NaiveDate,
    /// Date of its last operation.
    pub end: NaiveDate,
    /// Recorded values.
    pub metrics: BTreeMap<CropMetric, f64>,
}

/// A crop (or fallow) and its dated operations.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionProcess {
    name: String,
    crop: Option<CropId>,
    schedule: BTreeMap<SimDate, Vec<Operation>>,
    planting: Option<PlantingId>,
    metrics: BTreeMap<CropMetric, f64>,
}

impl ProductionProcess {
    /// Build a process from configured worksteps, resolving reference codes.
    ///
    /// A seed step whose month/day lies after that of the first harvest step
    /// is marked as a winter crop. An automatic sowing counts from the first
    /// day of its window and adds a deadline under its latest date; an
    /// automatic harvest counts from its latest date and is armed on the
    /// planting when the crop is sown.
    pub fn build(
        name: &str,
        worksteps: &[WorkStepConfig],
        reference: &ReferenceData,
    ) -> Result<Self, ScheduleError> {
        if worksteps.is_empty() {
            return Err(ScheduleError::Empty {
                process: name.to_owned(),
            });
        }

        let seeds: Vec<&WorkStepConfig> = worksteps
            .iter()
            .filter(|s| {
                matches!(
                    s.kind,
                    WorkStepKind::Seed { .. } | WorkStepKind::AutomaticSowing { .. }
                )
            })
            .collect();
        let harvest_date = worksteps
            .iter()
            .filter(|s| {
                matches!(
                    s.kind,
                    WorkStepKind::Harvest { .. } | WorkStepKind::AutomaticHarvest { .. }
                )
            })
            .map(|s| s.date)
            .min();
        let needs_crop = worksteps.iter().any(|s| {
            matches!(
                s.kind,
                WorkStepKind::Harvest { .. }
                    | WorkStepKind::AutomaticHarvest { .. }
                    | WorkStepKind::Cutting { .. }
            )
        });
        let automatic_harvest = worksteps.iter().find_map(|s| match s.kind {
            WorkStepKind::AutomaticHarvest {
                exported,
                conditions,
            } => Some(HarvestTrigger {
                exported,
                conditions,
            }),
            _ => None,
        });

        let crop = match seeds.as_slice() {
            [] if needs_crop => {
                return Err(ScheduleError::HarvestWithoutSeed {
                    process: name.to_owned(),
                });
            }
            [] => None,
            [seed] => match &seed.kind {
                WorkStepKind::Seed { crop } | WorkStepKind::AutomaticSowing { crop, .. } => {
                    Some(crop.clone())
                }
                _ => None,
            },
            _ => {
                return Err(ScheduleError::MultipleSeeds {
                    process: name.to_owned(),
                });
            }
        };
        let winter_crop = match (seeds.first(), harvest_date) {
            (Some(seed), Some(harvest)) => {
                (seed.date.month(), seed.date.day()) > (harvest.month(), harvest.day())
            }
            _ => false,
        };

        let plan = CropPlan {
            winter_crop,
            automatic_harvest,
        };

        let mut schedule: BTreeMap<SimDate, Vec<Operation>> = BTreeMap::new();
        for step in worksteps {
            let op = Operation::from_config(&step.kind, reference, plan).map_err(|source| {
                ScheduleError::Reference {
                    process: name.to_owned(),
                    source,
                }
            })?;
            if let (
                WorkStepKind::AutomaticSowing { latest, .. },
                Operation::AutomaticSowing { sowing, .. },
            ) = (&step.kind, &op)
            {
                if *latest < step.date {
                    return Err(ScheduleError::SowingWindow {
                        process: name.to_owned(),
                        earliest: step.date,
                        latest: *latest,
                    });
                }
                schedule
                    .entry(*latest)
                    .or_default()
                    .push(Operation::SowingDeadline(sowing.clone()));
            }
            schedule.entry(step.date).or_default().push(op);
        }

        Ok(Self {
            name: name.to_owned(),
            crop,
            schedule,
            planting: None,
            metrics: BTreeMap::new(),
        })
    }

    /// Process name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Crop sown by this process; `None` for fallow.
    pub const fn crop(&self) -> Option<&CropId> {
        self.crop.as_ref()
    }

    /// Whether the process sows nothing.
    pub const fn is_fallow(&self) -> bool {
        self.crop.is_none()
    }

    /// Earliest schedule date.
    pub fn start(&self) -> Option<SimDate> {
        self.schedule.keys().next().copied()
    }

    /// Latest schedule date.
    pub fn end(&self) -> Option<SimDate> {
        self.schedule.keys().next_back().copied()
    }

    /// Smallest schedule date strictly after `key`.
    pub fn next_date(&self, key: SimDate) -> Option<SimDate> {
        use core::ops::Bound::{Excluded, Unbounded};
        self.schedule
            .range((Excluded(key), Unbounded))
            .next()
            .map(|(k, _)| *k)
    }

    /// All schedule dates in order.
    pub fn dates(&self) -> impl Iterator<Item = SimDate> + '_ {
        self.schedule.keys().copied()
    }

    /// Operations stored under `key`, in insertion order.
    pub fn operations_on(&self, key: SimDate) -> &[Operation] {
        self.schedule.get(&key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Total number of operations.
    pub fn operation_count(&self) -> usize {
        self.schedule.values().map(Vec::len).sum()
    }

    /// The planting sown in the current occurrence.
    pub const fn planting(&self) -> Option<PlantingId> {
        self.planting
    }

    /// Apply every operation stored under `key`, in order. `index` is this
    /// process's position in the rotation.
    pub fn apply(
        &mut self,
        key: SimDate,
        index: usize,
        today: NaiveDate,
        field: &mut FieldModel<'_>,
    ) -> usize {
        let Some(ops) = self.schedule.get(&key) else {
            return 0;
        };
        let mut applied: usize = 0;
        for op in ops {
            let ctx = OperationContext {
                owner: index,
                planting: self.planting,
                today,
            };
            match field.apply_operation(op, ctx) {
                OperationOutcome::Sown(id) => self.planting = Some(id),
                OperationOutcome::Harvested(outcome) => merge(&mut self.metrics, outcome),
                OperationOutcome::Cut(_) | OperationOutcome::Applied => {}
                OperationOutcome::Skipped => continue,
            }
            applied = applied.saturating_add(1);
        }
        debug!(process = %self.name, date = %today, applied, "Process date applied");
        applied
    }

    /// Note a planting sown outside the schedule (automatic sowing) for the
    /// current occurrence.
    pub fn record_sowing(&mut self, planting: PlantingId) {
        self.planting = Some(planting);
    }

    /// Store results produced outside the schedule (automatic harvest,
    /// incorporation of a dead crop) for the planting this process sowed.
    ///
    /// Only the planting of the current occurrence counts. A crop that
    /// outlived its occurrence ends after the occurrence's record was
    /// closed; its outcome is dropped. Returns whether it was stored.
    pub fn record_outcome(&mut self, outcome: CycleOutcome) -> bool {
        if self.planting != Some(outcome.planting) {
            warn!(
                process = %self.name,
                planting = %outcome.planting,
                "Outcome of a planting from a closed occurrence dropped"
            );
            return false;
        }
        merge(&mut self.metrics, outcome);
        true
    }

    /// Close the current occurrence. Returns its record unless the process is
    /// fallow, and resets the process for its next occurrence.
    pub fn finish_occurrence(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
        sum_fertilizer: f64,
        use_secondary_yields: bool,
    ) -> Option<CycleRecord> {
        let mut metrics = std::mem::take(&mut self.metrics);
        self.planting = None;
        if self.is_fallow() {
            return None;
        }

        metrics.insert(CropMetric::SumFertilizer, sum_fertilizer);
        if !use_secondary_yields {
            metrics.insert(CropMetric::SecondaryYield, 0.0);
        }
        Some(CycleRecord {
            process: self.name.clone(),
            crop: self.crop.clone(),
            start,
            end,
            metrics,
        })
    }
}

fn merge(metrics: &mut BTreeMap<CropMetric, f64>, outcome: CycleOutcome) {
    metrics.extend(outcome.metrics);
}
