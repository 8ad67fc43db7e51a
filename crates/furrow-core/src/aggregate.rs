//! Result aggregation.
//!
//! The aggregator receives one [`DayRecord`] per simulated day and the cycle
//! records of completed occurrences, and builds the [`SimulationResult`]:
//!
//! | Series                     | Granularity | Reduction          | Flushed              |
//! |----------------------------|-------------|--------------------|----------------------|
//! | development stage, inputs  | daily       | value of the day   | every day            |
//! | water and N fluxes         | monthly     | sum                | month end / last day |
//! | organic carbon, water      | monthly     | mean               | month end / last day |
//! | recharge, leaching         | yearly      | sum                | December 31          |
//! | soil state on March 31     | yearly      | sample             | March 31             |
//!
//! Yearly sums cover complete calendar years only; a first or last year the
//! run does not fully span produces no entry.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use furrow_types::{Granularity, SeriesMetric};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collaborators::{SoilFluxes, SoilSnapshot};
use crate::process::CycleRecord;
use crate::rotation::Occurrence;

/// How daily values are folded into a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reduction {
    Sum,
    Mean,
}

const MONTHLY: [(SeriesMetric, Reduction); 8] = [
    (SeriesMetric::GroundwaterRecharge, Reduction::Sum),
    (SeriesMetric::NitrogenLeaching, Reduction::Sum),
    (SeriesMetric::SurfaceRunoff, Reduction::Sum),
    (SeriesMetric::Precipitation, Reduction::Sum),
    (SeriesMetric::ActualEvapotranspiration, Reduction::Sum),
    (SeriesMetric::OrganicCarbon0To10, Reduction::Mean),
    (SeriesMetric::OrganicCarbon0To30, Reduction::Mean),
    (SeriesMetric::WaterContent0To90, Reduction::Mean),
];

const YEARLY: [(SeriesMetric, Reduction); 2] = [
    (SeriesMetric::GroundwaterRecharge, Reduction::Sum),
    (SeriesMetric::NitrogenLeaching, Reduction::Sum),
];

const MARCH_31: [SeriesMetric; 4] = [
    SeriesMetric::MineralNitrogen0To90AtMarch31,
    SeriesMetric::Nitrate0To90AtMarch31,
    SeriesMetric::SoilTemperature0To30AtMarch31,
    SeriesMetric::WaterContent0To30AtMarch31,
];

const DAILY: [SeriesMetric; 3] = [
    SeriesMetric::DevelopmentStage,
    SeriesMetric::Fertilizer,
    SeriesMetric::Irrigation,
];

/// Everything recorded about one simulated day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayRecord {
    /// The day.
    pub date: NaiveDate,
    /// Precipitation (mm).
    pub precipitation: f64,
    /// Soil fluxes of the day.
    pub fluxes: SoilFluxes,
    /// Soil state at the end of the day.
    pub soil: SoilSnapshot,
    /// Development stage value (0 without a crop).
    pub development_stage: f64,
    /// Mineral fertilizer applied (kg N ha-1).
    pub fertilizer: f64,
    /// Irrigation applied (mm).
    pub irrigation: f64,
}

impl DayRecord {
    fn value(&self, metric: SeriesMetric) -> f64 {
        match metric {
            SeriesMetric::DevelopmentStage => self.development_stage,
            SeriesMetric::Fertilizer => self.fertilizer,
            SeriesMetric::Irrigation => self.irrigation,
            SeriesMetric::GroundwaterRecharge => self.fluxes.groundwater_recharge,
            SeriesMetric::NitrogenLeaching => self.fluxes.nitrogen_leaching,
            SeriesMetric::SurfaceRunoff => self.fluxes.surface_runoff,
            SeriesMetric::Precipitation => self.precipitation,
            SeriesMetric::ActualEvapotranspiration => self.fluxes.actual_evapotranspiration,
            SeriesMetric::OrganicCarbon0To10 => self.soil.organic_carbon_0_to_10,
            SeriesMetric::OrganicCarbon0To30 => self.soil.organic_carbon_0_to_30,
            SeriesMetric::WaterContent0To90 => self.soil.water_content_0_to_90,
            SeriesMetric::MineralNitrogen0To90AtMarch31 => self.soil.mineral_nitrogen_0_to_90,
            SeriesMetric::Nitrate0To90AtMarch31 => self.soil.nitrate_0_to_90,
            SeriesMetric::SoilTemperature0To30AtMarch31 => self.soil.soil_temperature_0_to_30,
            SeriesMetric::WaterContent0To30AtMarch31 => self.soil.water_content_0_to_30,
        }
    }
}

/// One entry of a monthly or yearly series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// First day of the window (or the sampling day).
    pub period: NaiveDate,
    /// Aggregated value.
    pub value: f64,
}

/// Everything a run produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// One record per completed non-fallow process occurrence.
    pub cycles: Vec<CycleRecord>,
    /// Simulated dates, aligned with the daily series.
    pub dates: Vec<NaiveDate>,
    /// Daily series.
    pub daily: BTreeMap<SeriesMetric, Vec<f64>>,
    /// Monthly series.
    pub monthly: BTreeMap<SeriesMetric, Vec<SeriesPoint>>,
    /// Yearly series.
    pub yearly: BTreeMap<SeriesMetric, Vec<SeriesPoint>>,
    /// Process activations.
    pub occurrences: Vec<Occurrence>,
}

impl SimulationResult {
    /// Whether nothing was simulated.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() && self.cycles.is_empty()
    }

    /// Values of a monthly or yearly series, in order.
    pub fn values(&self, granularity: Granularity, metric: SeriesMetric) -> Vec<f64> {
        let points = match granularity {
            Granularity::Daily => return self.daily.get(&metric).cloned().unwrap_or_default(),
            Granularity::Monthly => self.monthly.get(&metric),
            Granularity::Yearly => self.yearly.get(&metric),
        };
        points
            .map(|p| p.iter().map(|x| x.value).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Accumulator {
    sum: f64,
    days: u32,
}

impl Accumulator {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.days = self.days.saturating_add(1);
    }

    fn reduce(self, reduction: Reduction) -> f64 {
        match reduction {
            Reduction::Sum => self.sum,
            Reduction::Mean if self.days > 0 => self.sum / f64::from(self.days),
            Reduction::Mean => 0.0,
        }
    }
}

/// Builds a [`SimulationResult`] day by day.
#[derive(Debug)]
pub struct ResultAggregator {
    result: SimulationResult,
    start: NaiveDate,
    monthly: BTreeMap<SeriesMetric, Accumulator>,
    yearly: BTreeMap<SeriesMetric, Accumulator>,
}

impl ResultAggregator {
    /// Aggregator for a run starting on `start`.
    pub fn new(start: NaiveDate) -> Self {
        Self {
            result: SimulationResult::default(),
            start,
            monthly: BTreeMap::new(),
            yearly: BTreeMap::new(),
        }
    }

    /// Append the record of a completed occurrence.
    pub fn record_cycle(&mut self, record: CycleRecord) {
        debug!(process = %record.process, end = %record.end, "Cycle recorded");
        self.result.cycles.push(record);
    }

    /// Fold one day into the series. `is_last_day` closes open windows.
    pub fn record_day(&mut self, day: &DayRecord, is_last_day: bool) {
        let date = day.date;
        self.result.dates.push(date);
        for metric in DAILY {
            self.result
                .daily
                .entry(metric)
                .or_default()
                .push(day.value(metric));
        }

        for (metric, _) in MONTHLY {
            self.monthly.entry(metric).or_default().add(day.value(metric));
        }
        for (metric, _) in YEARLY {
            self.yearly.entry(metric).or_default().add(day.value(metric));
        }

        if date.month() == 3 && date.day() == 31 {
            for metric in MARCH_31 {
                push_point(&mut self.result.yearly, metric, date, day.value(metric));
            }
        }

        let month_ends = date.succ_opt().is_none_or(|next| next.month() != date.month());
        if month_ends || is_last_day {
            self.flush_month(date);
        }
        if date.month() == 12 && date.day() == 31 {
            self.flush_year(date);
        }
    }

    fn flush_month(&mut self, date: NaiveDate) {
        let period = date.with_day(1).unwrap_or(date);
        for (metric, reduction) in MONTHLY {
            let acc = self.monthly.remove(&metric).unwrap_or_default();
            push_point(&mut self.result.monthly, metric, period, acc.reduce(reduction));
        }
    }

    fn flush_year(&mut self, date: NaiveDate) {
        let complete = date.year() > self.start.year() || self.start.ordinal() == 1;
        for (metric, reduction) in YEARLY {
            let acc = self.yearly.remove(&metric).unwrap_or_default();
            if complete {
                let period = NaiveDate::from_yo_opt(date.year(), 1).unwrap_or(date);
                push_point(&mut self.result.yearly, metric, period, acc.reduce(reduction));
            }
        }
    }

    /// Finish the run and hand back the result.
    pub fn finish(mut self, occurrences: Vec<Occurrence>) -> SimulationResult {
        self.result.occurrences = occurrences;
        self.result
    }
}

fn push_point(
    series: &mut BTreeMap<SeriesMetric, Vec<SeriesPoint>>,
    metric: SeriesMetric,
    period: NaiveDate,
    value: f64,
) {
    series
        .entry(metric)
        .or_default()
        .push(SeriesPoint { period, value });
}
