//! The simulated field: soil, the current planting, and the dispatch table
//! that turns operations into collaborator calls.
//!
//! Every state change to a field goes through [`FieldModel`]:
//!
//! - scheduled operations via [`FieldModel::apply_operation`]
//! - open automatic-sowing windows, checked once a day while the field is
//!   empty
//! - the daily crop step with its irrigation and harvest triggers
//! - the daily general step with deferred N-min doses, top dressings and
//!   the winter-crop N-min dose
//!
//! Inconsistent requests (a harvest for a crop that is not growing, a
//! sowing onto an occupied field) are logged and ignored.

use chrono::NaiveDate;
use furrow_types::{
    AutoIrrigationParameters, CropMetric, MineralFertilizer, NMinCropParameters,
    NMinUserParameters, PlantingId, SiteParameters, Weather,
};
use tracing::{debug, info, warn};

use crate::calendar::Calendar;
use crate::collaborators::{ModelFactory, SoilFluxes, SoilModel, SoilSnapshot};
use crate::environment;
use crate::lifecycle::{CropLifecycle, CycleOutcome, Planting};
use crate::operation::{Operation, Sowing};
use crate::triggers::{self, NitrogenQueue, SowingWindow, WeatherHistory};

/// Automation switches and parameters of a field.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagementSettings {
    /// Fertilize with the N-min method instead of scheduled mineral doses.
    pub use_nmin: bool,
    /// Bounds of the N-min method.
    pub nmin: NMinUserParameters,
    /// Fertilizer used for N-min doses and top dressings.
    pub nmin_fertilizer: MineralFertilizer,
    /// Irrigate by soil moisture instead of scheduled irrigation.
    pub use_auto_irrigation: bool,
    /// Parameters of the irrigation trigger.
    pub auto_irrigation: AutoIrrigationParameters,
    /// Whether secondary yield products leave the field.
    pub use_secondary_yields: bool,
}

/// Where an operation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationSource {
    /// The static schedule of a production process.
    Schedule,
    /// An autonomous trigger.
    Trigger,
}

/// Who is asking for an operation, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationContext {
    /// Index of the requesting process.
    pub owner: usize,
    /// Planting the requesting process sowed in its current occurrence.
    pub planting: Option<PlantingId>,
    /// Today.
    pub today: NaiveDate,
}

/// What an operation did.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    /// Applied with no result to record.
    Applied,
    /// Ignored (inconsistent request or superseded by automation).
    Skipped,
    /// A crop was sown.
    Sown(PlantingId),
    /// A planting was harvested.
    Harvested(CycleOutcome),
    /// Biomass was cut from a planting (kg DM ha-1).
    Cut(f64),
}

/// Fertilizer and irrigation applied today.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DailySums {
    /// Mineral fertilizer N (kg N ha-1).
    pub fertilizer: f64,
    /// Irrigation water (mm).
    pub irrigation: f64,
}

/// Soil, planting and automation state of one field.
pub struct FieldModel<'a> {
    soil: Box<dyn SoilModel>,
    factory: &'a dyn ModelFactory,
    site: SiteParameters,
    calendar: Calendar,
    settings: ManagementSettings,
    lifecycle: CropLifecycle,
    nitrogen: NitrogenQueue,
    weather: WeatherHistory,
    sowing_window: Option<SowingWindow>,
    daily: DailySums,
    cycle_fertilizer: f64,
}

impl core::fmt::Debug for FieldModel<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FieldModel")
            .field("calendar", &self.calendar)
            .field("lifecycle", &self.lifecycle)
            .field("nitrogen", &self.nitrogen)
            .field("sowing_window", &self.sowing_window)
            .field("daily", &self.daily)
            .finish_non_exhaustive()
    }
}

impl<'a> FieldModel<'a> {
    /// Assemble a field around an existing soil model.
    pub fn new(
        soil: Box<dyn SoilModel>,
        factory: &'a dyn ModelFactory,
        site: SiteParameters,
        calendar: Calendar,
        settings: ManagementSettings,
    ) -> Self {
        Self {
            soil,
            factory,
            site,
            calendar,
            settings,
            lifecycle: CropLifecycle::new(),
            nitrogen: NitrogenQueue::default(),
            weather: WeatherHistory::default(),
            sowing_window: None,
            daily: DailySums::default(),
            cycle_fertilizer: 0.0,
        }
    }

    /// The planting lifecycle.
    pub const fn lifecycle(&self) -> &CropLifecycle {
        &self.lifecycle
    }

    /// The soil model.
    pub fn soil(&self) -> &dyn SoilModel {
        self.soil.as_ref()
    }

    /// Pending automatic fertilization.
    pub const fn nitrogen_queue(&self) -> &NitrogenQueue {
        &self.nitrogen
    }

    /// Fertilizer and irrigation applied today.
    pub const fn daily_sums(&self) -> DailySums {
        self.daily
    }

    /// The open automatic-sowing window, if any.
    pub const fn sowing_window(&self) -> Option<&SowingWindow> {
        self.sowing_window.as_ref()
    }

    /// Zero today's sums. Called first thing every day.
    pub fn reset_daily_sums(&mut self) {
        self.daily = DailySums::default();
    }

    /// Add today's weather to the history the sowing and harvest conditions
    /// look back on.
    pub fn record_weather(&mut self, today: NaiveDate, weather: &Weather) {
        self.weather.record(today, weather);
    }

    /// Mineral fertilizer applied since the last call, for the cycle record.
    pub fn take_cycle_fertilizer(&mut self) -> f64 {
        std::mem::replace(&mut self.cycle_fertilizer, 0.0)
    }

    /// Aggregated soil state.
    pub fn snapshot(&self) -> SoilSnapshot {
        self.soil.snapshot()
    }

    // -----------------------------------------------------------------------
    // Operation dispatch
    // -----------------------------------------------------------------------

    /// Apply a scheduled operation.
    pub fn apply_operation(&mut self, op: &Operation, ctx: OperationContext) -> OperationOutcome {
        self.dispatch(op, ctx, OperationSource::Schedule)
    }

    fn dispatch(
        &mut self,
        op: &Operation,
        ctx: OperationContext,
        source: OperationSource,
    ) -> OperationOutcome {
        debug!(date = %ctx.today, op = op.name(), ?source, "Applying operation");
        match op {
            Operation::Seed(sowing) => self.sow(sowing, ctx),
            Operation::AutomaticSowing { sowing, conditions } => {
                info!(
                    date = %ctx.today,
                    crop = %sowing.crop.id,
                    "Sowing window opened"
                );
                self.sowing_window = Some(SowingWindow::new(ctx.owner, sowing.clone(), *conditions));
                OperationOutcome::Applied
            }
            Operation::SowingDeadline(sowing) => {
                if self.sowing_window.as_ref().is_some_and(|w| w.owner == ctx.owner) {
                    self.sowing_window = None;
                }
                if ctx.planting.is_some() {
                    debug!(date = %ctx.today, "Sowing deadline passed, crop already sown");
                    return OperationOutcome::Skipped;
                }
                info!(
                    date = %ctx.today,
                    crop = %sowing.crop.id,
                    "Sowing conditions never met, sowing on the latest date"
                );
                self.sow(sowing, ctx)
            }
            Operation::Harvest { exported } => {
                if !self.lifecycle.is_live(ctx.planting) {
                    info!(
                        date = %ctx.today,
                        planting = ?ctx.planting,
                        "Harvest skipped: crop already harvested or not growing"
                    );
                    return OperationOutcome::Skipped;
                }
                self.harvest(*exported, ctx.today)
                    .map_or(OperationOutcome::Skipped, OperationOutcome::Harvested)
            }
            Operation::AutomaticHarvest { exported } => {
                if !self.lifecycle.is_live(ctx.planting) {
                    debug!(
                        date = %ctx.today,
                        planting = ?ctx.planting,
                        "Latest harvest date: crop already harvested or not growing"
                    );
                    return OperationOutcome::Skipped;
                }
                info!(date = %ctx.today, "Latest harvest date reached: harvesting");
                self.harvest(*exported, ctx.today)
                    .map_or(OperationOutcome::Skipped, OperationOutcome::Harvested)
            }
            Operation::Cutting { fraction, exported } => {
                if !self.lifecycle.is_live(ctx.planting) {
                    info!(date = %ctx.today, "Cutting skipped: crop not growing");
                    return OperationOutcome::Skipped;
                }
                OperationOutcome::Cut(self.cut(*fraction, *exported))
            }
            Operation::MineralFertilize { fertilizer, amount } => {
                if self.settings.use_nmin && source == OperationSource::Schedule {
                    info!(
                        date = %ctx.today,
                        fertilizer = %fertilizer.id,
                        "Scheduled mineral fertilizer ignored: N-min method active"
                    );
                    return OperationOutcome::Skipped;
                }
                self.apply_mineral(fertilizer, *amount);
                OperationOutcome::Applied
            }
            Operation::NDemandFertilize {
                fertilizer,
                n_demand,
                depth,
            } => {
                let Some(rooting_depth) = self.lifecycle.current().map(|p| p.growth.rooting_depth())
                else {
                    info!(date = %ctx.today, "N demand fertilization skipped: no crop growing");
                    return OperationOutcome::Skipped;
                };
                let depth = depth.min(rooting_depth);
                let available = self.soil.mineral_nitrogen_to_depth(depth);
                let dose = (n_demand - available).max(0.0);
                info!(
                    date = %ctx.today,
                    n_demand,
                    depth,
                    available,
                    dose,
                    "N demand fertilization"
                );
                if dose > 0.0 {
                    self.apply_mineral(fertilizer, dose);
                }
                OperationOutcome::Applied
            }
            Operation::OrganicFertilize {
                fertilizer,
                amount,
                incorporate,
            } => {
                self.soil
                    .apply_organic_fertilizer(fertilizer, *amount, *incorporate);
                OperationOutcome::Applied
            }
            Operation::Tillage { depth } => {
                self.soil.apply_tillage(*depth);
                OperationOutcome::Applied
            }
            Operation::Irrigate {
                amount,
                nitrate_concentration,
            } => {
                if self.settings.use_auto_irrigation && source == OperationSource::Schedule {
                    info!(
                        date = %ctx.today,
                        "Scheduled irrigation ignored: automatic irrigation active"
                    );
                    return OperationOutcome::Skipped;
                }
                self.soil.apply_irrigation(*amount, *nitrate_concentration);
                self.daily.irrigation += amount;
                if let Some(planting) = self.lifecycle.current_mut() {
                    planting.applied_irrigation += amount;
                }
                OperationOutcome::Applied
            }
        }
    }

    /// Put the crop of `sowing` on the field for `ctx.owner`.
    fn sow(&mut self, sowing: &Sowing, ctx: OperationContext) -> OperationOutcome {
        let crop = &sowing.crop;
        let growth = self.factory.crop(crop, &self.site);
        let Some(id) = self.lifecycle.sow(
            ctx.owner,
            crop.as_ref().clone(),
            ctx.today,
            sowing.winter_crop,
            growth,
        ) else {
            warn!(
                date = %ctx.today,
                crop = %crop.id,
                "Seed ignored: another crop is still growing"
            );
            return OperationOutcome::Skipped;
        };
        if let Some(planting) = self.lifecycle.current_mut() {
            planting.harvest_trigger = sowing.automatic_harvest;
        }
        info!(date = %ctx.today, crop = %crop.id, planting = %id, "Crop sown");
        if self.settings.use_nmin && !sowing.winter_crop {
            self.apply_nmin(crop.nmin, ctx.today);
        }
        OperationOutcome::Sown(id)
    }

    /// Sow from the open automatic-sowing window if today's conditions
    /// allow it. Returns the owning process and the new planting.
    pub fn sow_if_window_allows(&mut self, today: NaiveDate) -> Option<(usize, PlantingId)> {
        if self.lifecycle.is_growing() {
            return None;
        }
        let window = self.sowing_window.as_mut()?;
        window.record_soil_temperature(self.soil.as_ref());
        if !window.conditions_met(&self.weather, self.soil.as_ref()) {
            return None;
        }
        let window = self.sowing_window.take()?;
        info!(date = %today, crop = %window.sowing.crop.id, "Sowing conditions met");
        let ctx = OperationContext {
            owner: window.owner,
            planting: None,
            today,
        };
        match self.dispatch(&Operation::Seed(window.sowing), ctx, OperationSource::Trigger) {
            OperationOutcome::Sown(id) => Some((window.owner, id)),
            _ => None,
        }
    }

    fn apply_mineral(&mut self, fertilizer: &MineralFertilizer, amount: f64) {
        self.soil.apply_mineral_fertilizer(fertilizer, amount);
        self.daily.fertilizer += amount;
        self.cycle_fertilizer += amount;
    }

    // -----------------------------------------------------------------------
    // Planting transitions
    // -----------------------------------------------------------------------

    /// Harvest the growing crop, return residues to the soil and produce its
    /// cycle metrics.
    fn harvest(&mut self, exported: bool, today: NaiveDate) -> Option<CycleOutcome> {
        let planting = self.lifecycle.release()?;
        let soil = self.soil.snapshot();
        let crop = planting.growth.as_ref();

        let above_ground = crop.above_ground_biomass();
        let mut removed = 0.0;
        if exported {
            removed += crop.primary_yield_dry_matter();
        }
        if self.settings.use_secondary_yields {
            removed += crop.secondary_yield_dry_matter();
        }
        let residues = (above_ground - removed).max(0.0);
        self.soil.add_organic_matter(
            &planting.params.residues,
            residues,
            crop.above_ground_n_concentration(),
        );
        self.soil.add_organic_matter(
            &planting.params.residues,
            crop.root_biomass(),
            crop.root_n_concentration(),
        );

        let mut metrics = planting.totals();
        metrics.extend([
            (CropMetric::PrimaryYield, crop.primary_yield()),
            (CropMetric::SecondaryYield, crop.secondary_yield()),
            (CropMetric::AboveGroundBiomass, above_ground),
            (CropMetric::RootBiomass, crop.root_biomass()),
            (
                CropMetric::PrimaryYieldNConcentration,
                crop.primary_yield_n_concentration(),
            ),
            (
                CropMetric::AboveGroundBiomassNConcentration,
                crop.above_ground_n_concentration(),
            ),
            (CropMetric::SumNitrogenUptake, crop.total_n_uptake()),
            (
                CropMetric::MineralNitrogen0To90AtHarvest,
                soil.mineral_nitrogen_0_to_90,
            ),
            (CropMetric::WaterContent0To90AtHarvest, soil.water_content_0_to_90),
            (
                CropMetric::OrganicCarbon0To30AtHarvest,
                soil.organic_carbon_0_to_30,
            ),
        ]);

        info!(
            date = %today,
            crop = %planting.params.id,
            planting = %planting.id,
            primary_yield = crop.primary_yield(),
            residues,
            "Crop harvested"
        );

        Some(CycleOutcome {
            owner: planting.owner,
            planting: planting.id,
            metrics,
        })
    }

    fn cut(&mut self, fraction: f64, exported: bool) -> f64 {
        let Some(planting) = self.lifecycle.current_mut() else {
            return 0.0;
        };
        let removed = planting.growth.apply_cutting(fraction);
        planting.cut_biomass += removed;
        if !exported {
            self.soil.add_organic_matter(
                &planting.params.residues,
                removed,
                planting.growth.above_ground_n_concentration(),
            );
        }
        debug!(removed, exported, "Crop cut");
        removed
    }

    /// Work a dead crop into the soil. Returns the totals of the planting,
    /// addressed to its owner, or `None` when nothing was dying.
    pub fn incorporate_if_dying(&mut self, today: NaiveDate) -> Option<CycleOutcome> {
        if !self.lifecycle.is_dying() {
            return None;
        }
        let planting = self.lifecycle.release()?;
        let crop = planting.growth.as_ref();
        let above = crop.above_ground_biomass();
        let roots = crop.root_biomass();
        let total = above + roots;
        let n_concentration = if total > 0.0 {
            above.mul_add(
                crop.above_ground_n_concentration(),
                roots * crop.root_n_concentration(),
            ) / total
        } else {
            0.0
        };
        self.soil
            .add_organic_matter(&planting.params.residues, total, n_concentration);
        info!(
            date = %today,
            crop = %planting.params.id,
            planting = %planting.id,
            biomass = total,
            "Dying crop incorporated"
        );
        Some(CycleOutcome {
            owner: planting.owner,
            planting: planting.id,
            metrics: planting.totals(),
        })
    }

    // -----------------------------------------------------------------------
    // Daily steps
    // -----------------------------------------------------------------------

    /// Step the growing crop and evaluate the irrigation and harvest
    /// triggers. Returns the outcome of an automatic harvest.
    pub fn crop_step(
        &mut self,
        today: NaiveDate,
        weather: &Weather,
        co2: f64,
    ) -> Option<CycleOutcome> {
        let planting = self.lifecycle.current_mut()?;
        planting.growth.step(weather, co2, self.soil.as_mut());
        planting.record_day();

        let owner = planting.owner;
        let planting_id = planting.id;
        let window = planting.params.irrigation_window;
        let temperature_sum = planting.growth.temperature_sum();
        let trigger = planting.harvest_trigger;
        let mature = planting.growth.is_mature() && !planting.growth.is_dying();
        let template_harvest = harvest_due(planting);

        if self.settings.use_auto_irrigation
            && triggers::irrigation_due(
                &self.settings.auto_irrigation,
                &window,
                temperature_sum,
                self.soil.as_ref(),
            )
        {
            let irrigation = Operation::Irrigate {
                amount: self.settings.auto_irrigation.amount,
                nitrate_concentration: self.settings.auto_irrigation.nitrate_concentration,
            };
            info!(date = %today, amount = self.settings.auto_irrigation.amount, "Automatic irrigation");
            let ctx = OperationContext {
                owner,
                planting: Some(planting_id),
                today,
            };
            self.dispatch(&irrigation, ctx, OperationSource::Trigger);
        }

        let harvest = match trigger {
            Some(trigger) => triggers::harvest_conditions_met(
                &trigger.conditions,
                mature,
                &self.weather,
                self.soil.as_ref(),
            )
            .then_some(trigger.exported),
            None => template_harvest.then_some(true),
        };
        let exported = harvest?;
        info!(date = %today, planting = %planting_id, "Crop mature: automatic harvest");
        let ctx = OperationContext {
            owner,
            planting: Some(planting_id),
            today,
        };
        match self.dispatch(&Operation::Harvest { exported }, ctx, OperationSource::Trigger) {
            OperationOutcome::Harvested(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Everything that happens to the field regardless of a crop: delayed
    /// fertilization, the soil processes.
    pub fn general_step(&mut self, today: NaiveDate, weather: &Weather) -> SoilFluxes {
        for crop in self.nitrogen.take_deferred() {
            debug!(date = %today, "Retrying deferred N-min application");
            self.apply_nmin(crop, today);
        }

        if let Some(amount) = self.nitrogen.tick_top_dressing() {
            info!(date = %today, amount, "Applying top dressing");
            let fertilizer = self.settings.nmin_fertilizer.clone();
            self.apply_mineral(&fertilizer, amount);
        }

        if self.settings.use_nmin {
            let day_of_year = self.calendar.day_of_year(today);
            let target_day = self.settings.nmin.winter_crop_day_of_year;
            let due = self.lifecycle.current_mut().and_then(|p| {
                (p.winter_crop && !p.winter_nmin_applied && day_of_year == target_day).then(|| {
                    p.winter_nmin_applied = true;
                    p.params.nmin
                })
            });
            if let Some(crop) = due {
                info!(date = %today, "N-min dose for winter crop");
                self.apply_nmin(crop, today);
            }
        }

        let depth = environment::groundwater_depth(&self.site.groundwater, &self.calendar, today);
        self.soil.general_step(weather, depth)
    }

    /// Fertilize by the N-min method. Returns the dose applied today.
    fn apply_nmin(&mut self, crop: NMinCropParameters, today: NaiveDate) -> f64 {
        if self.soil.is_too_wet_for_fertilizing() {
            info!(date = %today, "Soil too wet for N-min fertilization, deferring one day");
            self.nitrogen.defer(crop);
            return 0.0;
        }
        let demand = triggers::nmin_demand(self.soil.as_ref(), &crop);
        let plan = triggers::plan_nmin_dose(demand, &self.settings.nmin);
        if plan.top_dressing > 0.0
            && !self
                .nitrogen
                .schedule_top_dressing(plan.top_dressing, self.settings.nmin.delay_in_days)
        {
            info!(
                date = %today,
                surplus = plan.top_dressing,
                "No top dressing delay configured, surplus dropped"
            );
        }
        if plan.now > 0.0 {
            let fertilizer = self.settings.nmin_fertilizer.clone();
            self.apply_mineral(&fertilizer, plan.now);
        }
        info!(
            date = %today,
            demand,
            applied = plan.now,
            top_dressing = plan.top_dressing,
            "N-min fertilization"
        );
        plan.now
    }
}

/// A mature, live crop whose template asks for automatic harvest.
fn harvest_due(planting: &Planting) -> bool {
    planting.params.auto_harvest && planting.growth.is_mature() && !planting.growth.is_dying()
}
