//! The daily step: one simulated day of one field.
//!
//! Each day runs through these phases, in this order:
//!
//! 1. **Reset** -- zero the daily fertilizer and irrigation sums and add the
//!    day's weather to the field's history.
//! 2. **Incorporate** -- work a crop that died since yesterday into the soil
//!    and credit its totals to the process that sowed it.
//! 3. **Operations** -- apply every scheduled operation due today, repeating
//!    while the rotation keeps resolving to today, then sow from an open
//!    automatic-sowing window if its conditions hold.
//! 4. **Crop** -- step the growing crop with the CO2 concentration of the day;
//!    this evaluates the irrigation and harvest triggers.
//! 5. **Soil** -- deferred and delayed fertilization, the winter-crop N-min
//!    dose, groundwater depth and the soil collaborator's daily step.
//! 6. **Record** -- hand the day to the result aggregator.
//!
//! The step is deterministic given the same state, weather and
//! collaborators.

use chrono::NaiveDate;
use furrow_types::{SiteParameters, Weather};
use tracing::debug;

use crate::aggregate::{DayRecord, ResultAggregator};
use crate::calendar::Calendar;
use crate::collaborators::SoilFluxes;
use crate::environment;
use crate::field::FieldModel;
use crate::rotation::{RotationController, RotationError};

/// Errors that can occur during a simulated day.
#[derive(Debug, thiserror::Error)]
pub enum DayError {
    /// The rotation failed to resolve its next date.
    #[error("rotation error on {date}: {source}")]
    Rotation {
        /// The day being simulated.
        date: NaiveDate,
        /// The underlying rotation error.
        source: RotationError,
    },
}

/// Mutable state of one field run.
#[derive(Debug)]
pub struct SimulationState<'a> {
    /// Soil, planting and automation state.
    pub field: FieldModel<'a>,
    /// Rotation controller.
    pub rotation: RotationController,
    /// Result aggregator.
    pub aggregator: ResultAggregator,
    /// Calendar of the run.
    pub calendar: Calendar,
    /// Site of the field.
    pub site: SiteParameters,
}

/// Summary of one simulated day.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySummary {
    /// The day.
    pub date: NaiveDate,
    /// Occurrences that completed today.
    pub completed_cycles: usize,
    /// Whether a crop was harvested or incorporated today outside the
    /// schedule.
    pub crop_released: bool,
    /// Development stage value at the end of the day.
    pub development_stage: f64,
    /// Soil fluxes of the day.
    pub fluxes: SoilFluxes,
    /// Mineral fertilizer applied today (kg N ha-1).
    pub fertilizer: f64,
    /// Irrigation applied today (mm).
    pub irrigation: f64,
}

/// Simulate `today` with `weather`. `is_last_day` closes open aggregation
/// windows.
///
/// # Errors
///
/// Returns [`DayError`] if the rotation cannot resolve its next date.
pub fn run_day(
    state: &mut SimulationState<'_>,
    today: NaiveDate,
    weather: &Weather,
    is_last_day: bool,
) -> Result<DaySummary, DayError> {
    // --- Reset ---
    state.field.reset_daily_sums();
    state.field.record_weather(today, weather);

    // --- Incorporate ---
    let mut crop_released = false;
    if let Some(outcome) = state.field.incorporate_if_dying(today) {
        state.rotation.record_outcome(outcome);
        crop_released = true;
    }

    // --- Operations ---
    let records = state
        .rotation
        .apply_due(today, &mut state.field)
        .map_err(|source| DayError::Rotation {
            date: today,
            source,
        })?;
    let completed_cycles = records.len();
    for record in records {
        state.aggregator.record_cycle(record);
    }
    if let Some((owner, planting)) = state.field.sow_if_window_allows(today) {
        state.rotation.record_sowing(owner, planting);
    }

    // --- Crop ---
    if state.field.lifecycle().is_growing() {
        let co2 = environment::co2_for_date(&state.site, &state.calendar, today);
        if let Some(outcome) = state.field.crop_step(today, weather, co2) {
            state.rotation.record_outcome(outcome);
            crop_released = true;
        }
    }

    // --- Soil ---
    let fluxes = state.field.general_step(today, weather);

    // --- Record ---
    let sums = state.field.daily_sums();
    let development_stage = state.field.lifecycle().development_stage_value();
    let day = DayRecord {
        date: today,
        precipitation: weather.precipitation,
        fluxes,
        soil: state.field.snapshot(),
        development_stage,
        fertilizer: sums.fertilizer,
        irrigation: sums.irrigation,
    };
    state.aggregator.record_day(&day, is_last_day);

    debug!(
        date = %today,
        development_stage,
        fertilizer = sums.fertilizer,
        irrigation = sums.irrigation,
        completed_cycles,
        "Day simulated"
    );

    Ok(DaySummary {
        date: today,
        completed_cycles,
        crop_released,
        development_stage,
        fluxes,
        fertilizer: sums.fertilizer,
        irrigation: sums.irrigation,
    })
}
