//! Field run driver.
//!
//! This module provides [`run`], the entry point that simulates one field
//! over a [`Horizon`], and [`Simulation`], the assembled field state behind
//! it. A run:
//!
//! - validates the horizon and the climate series length before anything
//!   is simulated
//! - resolves the rotation against the reference data
//! - drives [`run_day`] once per day and hands each summary to a
//!   [`DayCallback`]
//!
//! Configuration errors are returned before the first day; no partial
//! result is produced.
//!
//! [`run_day`]: crate::step::run_day

use chrono::NaiveDate;
use furrow_types::Weather;
use tracing::{info, warn};

use crate::aggregate::{ResultAggregator, SimulationResult};
use crate::calendar::Calendar;
use crate::collaborators::ModelFactory;
use crate::config::FieldConfig;
use crate::field::{FieldModel, ManagementSettings};
use crate::process::{ProductionProcess, ScheduleError};
use crate::reference::{ReferenceData, ReferenceError};
use crate::rotation::{RotationController, RotationError};
use crate::step::{self, DayError, DaySummary, SimulationState};

/// Errors that stop a field run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The horizon ends before it starts.
    #[error("invalid horizon: {start} .. {end}")]
    InvalidHorizon {
        /// First day.
        start: NaiveDate,
        /// Last day.
        end: NaiveDate,
    },

    /// The climate series does not cover the horizon day for day.
    #[error("climate has {actual} days, horizon needs {expected}")]
    ClimateLengthMismatch {
        /// Days in the horizon.
        expected: usize,
        /// Records in the climate series.
        actual: usize,
    },

    /// A code in the field configuration is unknown.
    #[error("reference data error: {source}")]
    Reference {
        /// The underlying reference error.
        #[from]
        source: ReferenceError,
    },

    /// A production process is malformed.
    #[error("schedule error: {source}")]
    Schedule {
        /// The underlying schedule error.
        #[from]
        source: ScheduleError,
    },

    /// The rotation cannot be set up.
    #[error("rotation error: {source}")]
    Rotation {
        /// The underlying rotation error.
        #[from]
        source: RotationError,
    },

    /// A simulated day failed.
    #[error("day error: {source}")]
    Day {
        /// The underlying day error.
        #[from]
        source: DayError,
    },
}

/// Inclusive range of simulated days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Horizon {
    start: NaiveDate,
    end: NaiveDate,
}

impl Horizon {
    /// Horizon from `start` to `end`, both included.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::InvalidHorizon`] if `end` is before `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, RunError> {
        if end < start {
            return Err(RunError::InvalidHorizon { start, end });
        }
        Ok(Self { start, end })
    }

    /// First day.
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day.
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days.
    pub fn days(&self) -> usize {
        let days = self
            .end
            .signed_duration_since(self.start)
            .num_days()
            .saturating_add(1);
        usize::try_from(days).unwrap_or(0)
    }

    /// Every day, in order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(|d| *d <= self.end)
    }
}

/// Callback invoked after each simulated day.
pub trait DayCallback {
    /// Called after a day completes.
    fn on_day(&mut self, summary: &DaySummary, state: &SimulationState<'_>);
}

/// A callback that ignores every day.
pub struct NoOpCallback;

impl DayCallback for NoOpCallback {
    fn on_day(&mut self, _summary: &DaySummary, _state: &SimulationState<'_>) {}
}

/// One field, assembled and ready to run.
#[derive(Debug)]
pub struct Simulation<'a> {
    name: String,
    horizon: Horizon,
    state: SimulationState<'a>,
}

impl<'a> Simulation<'a> {
    /// Resolve the field configuration against the reference data and
    /// build its soil, rotation and aggregator.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] if a code is unknown, a process is malformed or
    /// the rotation cannot start.
    pub fn new(
        field: &FieldConfig,
        horizon: Horizon,
        reference: &ReferenceData,
        factory: &'a dyn ModelFactory,
    ) -> Result<Self, RunError> {
        let calendar = Calendar::new(field.leap_year_policy);

        let processes = field
            .rotation
            .iter()
            .map(|p| ProductionProcess::build(&p.name, &p.worksteps, reference))
            .collect::<Result<Vec<_>, _>>()?;
        let rotation = RotationController::new(
            processes,
            calendar,
            horizon.start(),
            field.use_secondary_yields,
        )?;

        let settings = ManagementSettings {
            use_nmin: field.nmin.enabled,
            nmin: field.nmin.params,
            nmin_fertilizer: reference.mineral_fertilizer(&field.nmin.fertilizer)?.clone(),
            use_auto_irrigation: field.auto_irrigation.enabled,
            auto_irrigation: field.auto_irrigation.params,
            use_secondary_yields: field.use_secondary_yields,
        };
        let soil = factory.soil(&field.soil, &field.site);
        let model = FieldModel::new(soil, factory, field.site, calendar, settings);

        info!(
            field = %field.name,
            start = %horizon.start(),
            end = %horizon.end(),
            layers = field.soil.len(),
            processes = field.rotation.len(),
            nmin = field.nmin.enabled,
            auto_irrigation = field.auto_irrigation.enabled,
            "Simulation initialized"
        );

        Ok(Self {
            name: field.name.clone(),
            horizon,
            state: SimulationState {
                field: model,
                rotation,
                aggregator: ResultAggregator::new(horizon.start()),
                calendar,
                site: field.site,
            },
        })
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Simulated days.
    pub const fn horizon(&self) -> Horizon {
        self.horizon
    }

    /// Current state.
    pub const fn state(&self) -> &SimulationState<'a> {
        &self.state
    }

    /// Run every day of the horizon.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::ClimateLengthMismatch`] before the first day if
    /// the climate does not match the horizon, or [`RunError::Day`] if a day
    /// fails.
    pub fn run(
        mut self,
        climate: &[Weather],
        callback: &mut dyn DayCallback,
    ) -> Result<SimulationResult, RunError> {
        check_climate(&self.horizon, climate)?;

        let end = self.horizon.end();
        for (today, weather) in self.horizon.dates().zip(climate) {
            let summary = step::run_day(&mut self.state, today, weather, today == end)?;
            callback.on_day(&summary, &self.state);
        }

        let SimulationState {
            rotation,
            aggregator,
            ..
        } = self.state;
        let result = aggregator.finish(rotation.into_occurrences());
        log_simulation_end(&self.name, &result);
        Ok(result)
    }
}

/// Simulate one field over `horizon` with one weather record per day.
///
/// A field without soil layers has nothing to simulate: the result is empty
/// and a warning is logged.
///
/// # Errors
///
/// Returns [`RunError`] for configuration errors (climate length, unknown
/// codes, malformed processes, an unresolvable rotation start) before the
/// first day, and for failures during the run.
pub fn run(
    field: &FieldConfig,
    horizon: Horizon,
    climate: &[Weather],
    reference: &ReferenceData,
    factory: &dyn ModelFactory,
) -> Result<SimulationResult, RunError> {
    check_climate(&horizon, climate)?;
    if field.soil.is_empty() {
        warn!(field = %field.name, "Field has no soil layers; nothing to simulate");
        return Ok(SimulationResult::default());
    }
    Simulation::new(field, horizon, reference, factory)?.run(climate, &mut NoOpCallback)
}

fn check_climate(horizon: &Horizon, climate: &[Weather]) -> Result<(), RunError> {
    let expected = horizon.days();
    if climate.len() != expected {
        return Err(RunError::ClimateLengthMismatch {
            expected,
            actual: climate.len(),
        });
    }
    Ok(())
}

/// Log the end of a field run.
pub fn log_simulation_end(field: &str, result: &SimulationResult) {
    info!(
        field,
        days = result.dates.len(),
        cycles = result.cycles.len(),
        occurrences = result.occurrences.len(),
        "Simulation ended"
    );
}
