//! Date-driven boundary conditions: groundwater table and atmospheric CO2.

use chrono::{Datelike, NaiveDate};
use furrow_types::{GroundwaterParameters, SiteParameters};

use crate::calendar::Calendar;

/// Depth used when the seasonal curve would put the table above ground (m).
const FALLBACK_GROUNDWATER_DEPTH: f64 = 20.0;

/// Groundwater table depth (m) on `date`.
///
/// The table follows a sine over the year between `min_depth` and
/// `max_depth`, shallowest around the middle of `min_depth_month`.
pub fn groundwater_depth(
    params: &GroundwaterParameters,
    calendar: &Calendar,
    date: NaiveDate,
) -> f64 {
    let days = f64::from(calendar.days_in_year(date.year()));
    let day_of_year = f64::from(calendar.day_of_year(date));
    let mean = (params.max_depth + params.min_depth) / 2.0;
    let amplitude = (params.max_depth - params.min_depth) / 2.0;
    let phase_shift = f64::from(params.min_depth_month).mul_add(30.0, -15.0);
    let angle = (day_of_year / days).mul_add(360.0, -90.0) - phase_shift;
    let depth = angle.to_radians().sin().mul_add(amplitude, mean);
    if depth < 0.0 {
        FALLBACK_GROUNDWATER_DEPTH
    } else {
        depth
    }
}

/// Historical atmospheric CO2 concentration (ppm) on `date`.
pub fn historical_co2(calendar: &Calendar, date: NaiveDate) -> f64 {
    let days = f64::from(calendar.days_in_year(date.year()));
    let decimal_year = f64::from(date.year()) + f64::from(calendar.day_of_year(date)) / days;
    let trend = (0.0119 * (decimal_year - 1580.0)).exp();
    let cycle = ((decimal_year - 0.5) / 0.1592).sin();
    2.5f64.mul_add(cycle, 222.0 + trend)
}

/// CO2 for `date`: the site's fixed concentration, or the historical curve
/// when none is configured.
pub fn co2_for_date(site: &SiteParameters, calendar: &Calendar, date: NaiveDate) -> f64 {
    if site.atmospheric_co2 > 0.0 {
        site.atmospheric_co2
    } else {
        historical_co2(calendar, date)
    }
}
