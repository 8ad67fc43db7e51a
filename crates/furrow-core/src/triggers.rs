//! Autonomous management triggers.
//!
//! These decide, from the current soil and crop state, whether the engine
//! should inject an operation that the static schedule does not contain:
//!
//! - **N-min fertilization** tops mineral N up to crop targets, splitting
//!   large doses into an immediate part and a delayed top dressing, and
//!   postponing the whole dose while the topsoil is too wet.
//! - **Automatic irrigation** waters when plant-available water in the
//!   critical depth drops to a threshold, but only inside the crop's
//!   temperature-sum window.
//! - **Automatic sowing** sows inside a date window on the first day the
//!   weather, topsoil moisture and soil temperature allow it.
//! - **Automatic harvest** harvests a mature crop once the topsoil and the
//!   recent rain allow it.

use std::collections::VecDeque;

use chrono::{Datelike, NaiveDate};
use furrow_types::{
    AutoIrrigationParameters, HarvestConditions, HarvestTime, IrrigationWindow,
    NMinCropParameters, NMinUserParameters, SowingConditions, Weather,
};
use tracing::debug;

use crate::collaborators::SoilModel;
use crate::operation::Sowing;

/// Depth of the shallow N-min target (m).
const TOPSOIL_SAMPLING_DEPTH: f64 = 0.3;

/// Depth whose moisture gates automatic sowing and harvest (m).
const TOPSOIL_MOISTURE_DEPTH: f64 = 0.1;

/// Days of weather kept for the sowing and harvest conditions.
const WEATHER_HISTORY_DAYS: usize = 366;

/// How an N-min demand is split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NitrogenPlan {
    /// Dose to apply today (kg N ha-1).
    pub now: f64,
    /// Dose to apply later as a top dressing (kg N ha-1).
    pub top_dressing: f64,
}

impl NitrogenPlan {
    const NONE: Self = Self {
        now: 0.0,
        top_dressing: 0.0,
    };
}

/// Mineral N still missing to reach both crop targets (kg N ha-1).
pub fn nmin_demand(soil: &dyn SoilModel, crop: &NMinCropParameters) -> f64 {
    let deep = crop.target_n_sampling_depth - soil.mineral_nitrogen_to_depth(crop.sampling_depth);
    let top = crop.target_n30 - soil.mineral_nitrogen_to_depth(TOPSOIL_SAMPLING_DEPTH);
    deep.max(top).max(0.0)
}

/// Split a demand according to the user's minimum and maximum dose.
///
/// Demands below `min` are dropped. Above `max`, `max` is applied now and
/// the surplus is planned as a top dressing.
pub fn plan_nmin_dose(demand: f64, user: &NMinUserParameters) -> NitrogenPlan {
    if demand < user.min || demand <= 0.0 {
        return NitrogenPlan::NONE;
    }
    if demand > user.max {
        return NitrogenPlan {
            now: user.max,
            top_dressing: demand - user.max,
        };
    }
    NitrogenPlan {
        now: demand,
        top_dressing: 0.0,
    }
}

/// A top dressing waiting for its delay to run out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopDressing {
    /// Dose to apply (kg N ha-1).
    pub amount: f64,
    /// General steps left; applied by the step that brings this to zero.
    pub days_left: u32,
}

/// Pending automatic fertilization work of one field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NitrogenQueue {
    deferred: Vec<NMinCropParameters>,
    top_dressing: Option<TopDressing>,
}

impl NitrogenQueue {
    /// Postpone an N-min application to the next day.
    pub fn defer(&mut self, crop: NMinCropParameters) {
        self.deferred.push(crop);
    }

    /// Take every postponed application; they are re-evaluated in order.
    pub fn take_deferred(&mut self) -> Vec<NMinCropParameters> {
        std::mem::take(&mut self.deferred)
    }

    /// Number of postponed applications.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Schedule a top dressing, replacing any earlier one.
    ///
    /// The general step of the scheduling day already counts down, so a
    /// dose planned during the day's operations lands `delay_in_days - 1`
    /// days later. Without a delay there is nothing to count down and the
    /// surplus is dropped; returns whether the dose was scheduled.
    pub fn schedule_top_dressing(&mut self, amount: f64, delay_in_days: u32) -> bool {
        if delay_in_days == 0 {
            return false;
        }
        self.top_dressing = Some(TopDressing {
            amount,
            days_left: delay_in_days,
        });
        true
    }

    /// The scheduled top dressing, if any.
    pub const fn top_dressing(&self) -> Option<TopDressing> {
        self.top_dressing
    }

    /// Count the top dressing down by one day, returning its dose on the day
    /// the counter reaches zero.
    pub fn tick_top_dressing(&mut self) -> Option<f64> {
        let pending = self.top_dressing.as_mut()?;
        pending.days_left = pending.days_left.saturating_sub(1);
        if pending.days_left > 0 {
            return None;
        }
        let amount = pending.amount;
        self.top_dressing = None;
        (amount > 0.0).then_some(amount)
    }
}

/// Whether automatic irrigation should fire today.
pub fn irrigation_due(
    params: &AutoIrrigationParameters,
    window: &IrrigationWindow,
    temperature_sum: f64,
    soil: &dyn SoilModel,
) -> bool {
    if !window.contains(temperature_sum) {
        return false;
    }
    let available = soil.available_water_fraction(params.critical_depth);
    debug!(
        available,
        threshold = params.threshold,
        temperature_sum,
        "Checking irrigation trigger"
    );
    available <= params.threshold
}

/// Weather of the days simulated so far, newest last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherHistory {
    recent: VecDeque<Weather>,
    year: Option<i32>,
    year_mean_temperatures: Vec<f64>,
}

impl WeatherHistory {
    /// Add today's weather.
    pub fn record(&mut self, today: NaiveDate, weather: &Weather) {
        if self.recent.len() >= WEATHER_HISTORY_DAYS {
            self.recent.pop_front();
        }
        self.recent.push_back(*weather);
        if self.year != Some(today.year()) {
            self.year = Some(today.year());
            self.year_mean_temperatures.clear();
        }
        self.year_mean_temperatures.push(weather.mean_temperature);
    }

    /// The newest record.
    pub fn today(&self) -> Option<&Weather> {
        self.recent.back()
    }

    fn last(&self, days: u32) -> impl Iterator<Item = &Weather> {
        let days = usize::try_from(days).unwrap_or(usize::MAX);
        self.recent.iter().rev().take(days)
    }

    /// Mean of `value` over the last `days` days, or fewer if fewer were
    /// recorded. `None` before the first record.
    pub fn mean(&self, days: u32, value: impl Fn(&Weather) -> f64) -> Option<f64> {
        let (sum, count) = self
            .last(days.max(1))
            .fold((0.0, 0_u32), |(sum, count), w| (sum + value(w), count.saturating_add(1)));
        (count > 0).then(|| sum / f64::from(count))
    }

    /// Precipitation over the last `days` days, today included (mm).
    pub fn precipitation_sum(&self, days: u32) -> f64 {
        self.last(days).map(|w| w.precipitation).sum()
    }

    /// Sum of daily mean temperatures above `base` since 1 January of the
    /// newest record's year (degree days).
    pub fn temperature_sum(&self, base: f64) -> f64 {
        self.year_mean_temperatures
            .iter()
            .map(|t| (t - base).max(0.0))
            .sum()
    }
}

/// Topsoil moisture in percent of the available soil water.
fn topsoil_percent_asw(soil: &dyn SoilModel) -> f64 {
    soil.available_water_fraction(TOPSOIL_MOISTURE_DEPTH) * 100.0
}

fn moisture_ok(soil: &dyn SoilModel, min_percent: f64, max_percent: f64) -> bool {
    let percent = topsoil_percent_asw(soil);
    (min_percent..=max_percent).contains(&percent)
}

fn precipitation_ok(history: &WeatherHistory, max_3day: f64, max_today: f64) -> bool {
    let today = history.today().map_or(0.0, |w| w.precipitation);
    history.precipitation_sum(3) <= max_3day && today <= max_today
}

/// An automatic sowing waiting for its conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct SowingWindow {
    /// Index of the process that opened the window.
    pub owner: usize,
    /// The crop to sow.
    pub sowing: Sowing,
    /// What the window waits for.
    pub conditions: SowingConditions,
    soil_temperatures: Vec<f64>,
}

impl SowingWindow {
    /// Open a window for `owner`.
    pub const fn new(owner: usize, sowing: Sowing, conditions: SowingConditions) -> Self {
        Self {
            owner,
            sowing,
            conditions,
            soil_temperatures: Vec::new(),
        }
    }

    /// Remember today's soil temperature if the conditions ask for it.
    pub fn record_soil_temperature(&mut self, soil: &dyn SoilModel) {
        if let Some(required) = self.conditions.soil_temperature {
            self.soil_temperatures
                .push(soil.soil_temperature_to_depth(required.depth));
        }
    }

    /// Whether the crop can be sown today.
    ///
    /// Summer crops need the mean minimum temperature over the window and
    /// today's minimum at or above the threshold; winter crops need the
    /// mean temperature over the window at or below it.
    pub fn conditions_met(&self, history: &WeatherHistory, soil: &dyn SoilModel) -> bool {
        let c = &self.conditions;
        if let Some(required) = c.soil_temperature {
            let days = usize::try_from(required.days.max(1)).unwrap_or(usize::MAX);
            let recent: Vec<f64> = self.soil_temperatures.iter().rev().take(days).copied().collect();
            let Some(mean) = mean_of(&recent) else {
                return false;
            };
            if mean < required.average {
                debug!(mean, required = required.average, "Soil too cold for sowing");
                return false;
            }
        }

        let Some(today) = history.today() else {
            return false;
        };
        let window = c.temperature_window_days;
        let temperature_ok = if self.sowing.winter_crop {
            history
                .mean(window, |w| w.mean_temperature)
                .is_some_and(|t| t <= c.min_temperature)
        } else {
            history
                .mean(window, |w| w.min_temperature)
                .is_some_and(|t| t >= c.min_temperature)
                && today.min_temperature >= c.min_temperature
        };
        if !temperature_ok {
            debug!(threshold = c.min_temperature, "Air temperature rules out sowing");
            return false;
        }
        if !moisture_ok(soil, c.min_percent_asw, c.max_percent_asw) {
            debug!(percent_asw = topsoil_percent_asw(soil), "Topsoil moisture rules out sowing");
            return false;
        }
        if !precipitation_ok(history, c.max_3day_precipitation, c.max_current_day_precipitation) {
            debug!("Recent rain rules out sowing");
            return false;
        }
        history.temperature_sum(c.base_temperature) >= c.temperature_sum
    }
}

fn mean_of(values: &[f64]) -> Option<f64> {
    let count = u32::try_from(values.len()).ok().filter(|n| *n > 0)?;
    Some(values.iter().sum::<f64>() / f64::from(count))
}

/// Whether an automatic harvest may fire before its latest date.
pub fn harvest_conditions_met(
    conditions: &HarvestConditions,
    mature: bool,
    history: &WeatherHistory,
    soil: &dyn SoilModel,
) -> bool {
    conditions.harvest_time == HarvestTime::Maturity
        && mature
        && moisture_ok(soil, conditions.min_percent_asw, conditions.max_percent_asw)
        && precipitation_ok(
            history,
            conditions.max_3day_precipitation,
            conditions.max_current_day_precipitation,
        )
}
