//! Rotation cycle controller.
//!
//! Walks an ordered list of production processes, one process occurrence at
//! a time, wrapping back to the first process after the last. The controller
//! always knows the next calendar date on which something is due; the daily
//! loop asks it every day.
//!
//! # States
//!
//! ```text
//! AwaitingFirstApplication --first due date--> Active
//! Active --process completes--> Active (next process, wraps at the end)
//! Active --absolute start already past after a wrap--> Exhausted
//! ```
//!
//! Relative rotations never exhaust: a start that resolved into the past is
//! pushed one year ahead.

use chrono::{Datelike, NaiveDate};
use furrow_types::PlantingId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::calendar::{Calendar, CalendarError};
use crate::field::FieldModel;
use crate::lifecycle::CycleOutcome;
use crate::process::{CycleRecord, ProductionProcess};

/// Errors raised by the rotation controller.
#[derive(Debug, thiserror::Error)]
pub enum RotationError {
    /// The rotation has no processes.
    #[error("crop rotation is empty")]
    Empty,

    /// Absolute and relative dates are mixed within the rotation.
    #[error("rotation mixes absolute and relative dates (process `{process}`)")]
    MixedDateModes {
        /// First process whose dates disagree with the rest.
        process: String,
    },

    /// The first process starts before the simulation with absolute dates.
    #[error("first operation on {first} lies before the simulation start {start}")]
    StartsBeforeSimulation {
        /// Resolved first operation date.
        first: NaiveDate,
        /// Simulation start.
        start: NaiveDate,
    },

    /// A schedule date could not be resolved.
    #[error("date resolution failed: {source}")]
    Calendar {
        /// The underlying calendar error.
        #[from]
        source: CalendarError,
    },
}

/// Where the controller is in the rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationState {
    /// Nothing applied yet; waiting for the first process start.
    AwaitingFirstApplication,
    /// A process occurrence is under way or about to start.
    Active,
    /// Absolute dates have all passed; nothing more will be applied.
    Exhausted,
}

/// One activation of a process, for the result log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    /// Index of the process in the rotation.
    pub index: usize,
    /// Process name.
    pub process: String,
    /// Date its first operation was applied.
    pub start: NaiveDate,
    /// Date its last operation was applied; `None` while under way.
    pub end: Option<NaiveDate>,
}

/// Cursor into a schedule: the key and the calendar date it resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    key: furrow_types::SimDate,
    at: NaiveDate,
}

/// Drives the processes of a rotation through time.
#[derive(Debug)]
pub struct RotationController {
    processes: Vec<ProductionProcess>,
    calendar: Calendar,
    state: RotationState,
    index: usize,
    next: Cursor,
    occurrence_start: Option<NaiveDate>,
    occurrences: Vec<Occurrence>,
    use_secondary_yields: bool,
}

impl RotationController {
    /// Set up the rotation for a simulation starting on `start`.
    ///
    /// The first process start is resolved into the start year; a relative
    /// start that falls before `start` moves to the following year.
    pub fn new(
        processes: Vec<ProductionProcess>,
        calendar: Calendar,
        start: NaiveDate,
        use_secondary_yields: bool,
    ) -> Result<Self, RotationError> {
        let first = processes.first().ok_or(RotationError::Empty)?;
        check_date_modes(&processes)?;

        let key = first.start().ok_or(RotationError::Empty)?;
        let mut at = Calendar::resolve(key, start.year())?;
        if at < start {
            if !key.is_relative() {
                return Err(RotationError::StartsBeforeSimulation { first: at, start });
            }
            at = Calendar::add_years(at, 1)?;
        }

        info!(
            processes = processes.len(),
            first = %at,
            "Rotation initialized"
        );

        Ok(Self {
            processes,
            calendar,
            state: RotationState::AwaitingFirstApplication,
            index: 0,
            next: Cursor { key, at },
            occurrence_start: None,
            occurrences: Vec::new(),
            use_secondary_yields,
        })
    }

    /// Current state.
    pub const fn state(&self) -> RotationState {
        self.state
    }

    /// Index of the current process.
    pub const fn current_index(&self) -> usize {
        self.index
    }

    /// The processes of the rotation.
    pub fn processes(&self) -> &[ProductionProcess] {
        &self.processes
    }

    /// Date on which the next operation is due, unless exhausted.
    pub fn next_due(&self) -> Option<NaiveDate> {
        (self.state != RotationState::Exhausted).then_some(self.next.at)
    }

    /// Whether anything is due on `today`.
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.next_due() == Some(today)
    }

    /// Activations so far.
    pub fn occurrences(&self) -> &[Occurrence] {
        &self.occurrences
    }

    /// Hand an outcome produced outside the schedule to the process that
    /// owns the planting. Returns whether an open occurrence took it.
    pub fn record_outcome(&mut self, outcome: CycleOutcome) -> bool {
        let owner = outcome.owner;
        if let Some(process) = self.processes.get_mut(owner) {
            process.record_outcome(outcome)
        } else {
            warn!(owner, "Outcome for unknown process dropped");
            false
        }
    }

    /// Tell the owning process about a planting sown outside its schedule.
    pub fn record_sowing(&mut self, owner: usize, planting: PlantingId) {
        if let Some(process) = self.processes.get_mut(owner) {
            process.record_sowing(planting);
        } else {
            warn!(owner, %planting, "Sowing for unknown process ignored");
        }
    }

    /// Apply everything due on `today`. Returns the cycle records of the
    /// occurrences that completed.
    pub fn apply_due(
        &mut self,
        today: NaiveDate,
        field: &mut FieldModel<'_>,
    ) -> Result<Vec<CycleRecord>, RotationError> {
        let mut records = Vec::new();
        while self.is_due(today) {
            if self.state == RotationState::AwaitingFirstApplication {
                self.state = RotationState::Active;
            }
            let index = self.index;
            let Some(process) = self.processes.get_mut(index) else {
                return Err(RotationError::Empty);
            };

            if self.occurrence_start.is_none() {
                self.occurrence_start = Some(today);
                self.occurrences.push(Occurrence {
                    index,
                    process: process.name().to_owned(),
                    start: today,
                    end: None,
                });
                info!(date = %today, process = process.name(), index, "Process occurrence started");
            }

            let applied = self.next;
            process.apply(applied.key, index, today, field);

            if let Some(key) = process.next_date(applied.key) {
                let at = self.calendar.resolve_after(key, applied.key, applied.at)?;
                debug!(process = process.name(), next = %at, "Next operation resolved");
                self.next = Cursor { key, at };
                continue;
            }

            let start = self.occurrence_start.take().unwrap_or(today);
            let fertilizer = field.take_cycle_fertilizer();
            if let Some(record) =
                process.finish_occurrence(start, today, fertilizer, self.use_secondary_yields)
            {
                records.push(record);
            }
            if let Some(last) = self.occurrences.last_mut() {
                last.end = Some(today);
            }
            info!(date = %today, process = process.name(), index, "Process occurrence completed");

            self.advance(applied, today)?;
        }
        Ok(records)
    }

    /// Move to the next process and resolve its start.
    fn advance(&mut self, previous: Cursor, today: NaiveDate) -> Result<(), RotationError> {
        let count = self.processes.len();
        self.index = self.index.saturating_add(1).checked_rem(count).unwrap_or(0);
        let key = self
            .processes
            .get(self.index)
            .and_then(ProductionProcess::start)
            .ok_or(RotationError::Empty)?;

        let mut at = self.calendar.resolve_after(key, previous.key, previous.at)?;
        if key.is_relative() {
            if at <= today {
                at = Calendar::add_years(at, 1)?;
            }
        } else if at < today {
            warn!(
                date = %today,
                next_start = %at,
                "Absolute rotation has no future dates left; rotation exhausted"
            );
            self.state = RotationState::Exhausted;
        }
        self.next = Cursor { key, at };
        Ok(())
    }

    /// Hand back the occurrence log.
    pub fn into_occurrences(self) -> Vec<Occurrence> {
        self.occurrences
    }
}

fn check_date_modes(processes: &[ProductionProcess]) -> Result<(), RotationError> {
    let mut expected: Option<bool> = None;
    for process in processes {
        for date in process.dates() {
            let relative = date.is_relative();
            match expected {
                None => expected = Some(relative),
                Some(mode) if mode != relative => {
                    return Err(RotationError::MixedDateModes {
                        process: process.name().to_owned(),
                    });
                }
                Some(_) => {}
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::reference::ReferenceData;
    use furrow_types::WorkStepConfig;

    fn process(name: &str, yaml: &str) -> ProductionProcess {
        let steps: Vec<WorkStepConfig> = serde_yml::from_str(yaml).unwrap();
        ProductionProcess::build(name, &steps, &ReferenceData::builtin()).unwrap()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn maize() -> ProductionProcess {
        process(
            "maize",
            r#"
- { date: "04-25", type: seed, crop: SM }
- { date: "09-15", type: harvest }
"#,
        )
    }

    #[test]
    fn empty_rotation_is_rejected() {
        let err = RotationController::new(Vec::new(), Calendar::default(), ymd(2020, 1, 1), true)
            .unwrap_err();
        assert!(matches!(err, RotationError::Empty));
    }

    #[test]
    fn mixed_date_modes_are_rejected() {
        let absolute = process("fixed", r#"- { date: "2020-08-10", type: tillage }"#);
        let err = RotationController::new(
            vec![maize(), absolute],
            Calendar::default(),
            ymd(2020, 1, 1),
            true,
        )
        .unwrap_err();
        assert!(matches!(err, RotationError::MixedDateModes { process } if process == "fixed"));
    }

    #[test]
    fn first_start_in_start_year() {
        let rotation =
            RotationController::new(vec![maize()], Calendar::default(), ymd(2020, 1, 1), true)
                .unwrap();
        assert_eq!(rotation.state(), RotationState::AwaitingFirstApplication);
        assert_eq!(rotation.next_due(), Some(ymd(2020, 4, 25)));
        assert!(rotation.is_due(ymd(2020, 4, 25)));
        assert!(!rotation.is_due(ymd(2020, 4, 24)));
    }

    #[test]
    fn relative_start_already_past_moves_a_year() {
        let rotation =
            RotationController::new(vec![maize()], Calendar::default(), ymd(2020, 6, 1), true)
                .unwrap();
        assert_eq!(rotation.next_due(), Some(ymd(2021, 4, 25)));
    }

    #[test]
    fn absolute_start_before_simulation_is_rejected() {
        let absolute = process("fixed", r#"- { date: "2019-08-10", type: tillage }"#);
        let err =
            RotationController::new(vec![absolute], Calendar::default(), ymd(2020, 1, 1), true)
                .unwrap_err();
        assert!(matches!(err, RotationError::StartsBeforeSimulation { .. }));
    }
}
