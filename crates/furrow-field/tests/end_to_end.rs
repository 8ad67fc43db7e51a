//! End-to-end field runs with the reference soil and crop models on
//! generated climate.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::float_cmp
)]

use chrono::{Datelike, NaiveDate};
use furrow_core::config::ClimateConfig;
use furrow_core::{FieldConfig, Horizon, ReferenceData, SimulationResult, run};
use furrow_field::{ClimateGenerator, FieldModels};
use furrow_types::{CropMetric, Granularity, SeriesMetric};

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn simulate(yaml: &str, horizon: Horizon, seed: u64) -> SimulationResult {
    let field: FieldConfig = serde_yml::from_str(yaml).expect("field config parses");
    let config = ClimateConfig {
        seed,
        ..ClimateConfig::default()
    };
    let climate = ClimateGenerator::new(config, field.site.latitude)
        .unwrap()
        .generate(&horizon);
    run(
        &field,
        horizon,
        &climate,
        &ReferenceData::builtin(),
        &FieldModels,
    )
    .unwrap()
}

const MAIZE: &str = r#"
name: maize
soil:
  - { thickness: 0.3 }
  - { thickness: 0.3 }
  - { thickness: 0.3 }
  - { thickness: 0.3 }
rotation:
  - name: maize
    worksteps:
      - { date: "04-10", type: tillage, depth: 0.3 }
      - { date: "04-15", type: organic_fertilize, fertilizer: CADLM, amount: 20000, incorporation: true }
      - { date: "04-25", type: seed, crop: SM }
      - { date: "10-15", type: harvest }
"#;

#[test]
fn maize_is_harvested_automatically_at_maturity() {
    let horizon = Horizon::new(ymd(2021, 1, 1), ymd(2021, 12, 31)).unwrap();
    let result = simulate(MAIZE, horizon, 42);

    assert_eq!(result.cycles.len(), 1);
    let cycle = &result.cycles[0];
    assert!(cycle.metrics[&CropMetric::PrimaryYield] > 0.0);
    assert!(cycle.metrics[&CropMetric::AboveGroundBiomass] > 1_000.0);
    assert!(cycle.metrics[&CropMetric::SumNitrogenUptake] > 0.0);

    // mature well before the scheduled harvest date
    let stage = &result.daily[&SeriesMetric::DevelopmentStage];
    let october = usize::try_from(ymd(2021, 10, 1).ordinal0()).unwrap();
    assert_eq!(stage[october], 0.0);
    let june = usize::try_from(ymd(2021, 6, 15).ordinal0()).unwrap();
    assert!(stage[june] > 0.0);
}

#[test]
fn generated_runs_are_deterministic() {
    let horizon = Horizon::new(ymd(2020, 1, 1), ymd(2022, 12, 31)).unwrap();
    let a = serde_json::to_string(&simulate(MAIZE, horizon, 42)).unwrap();
    let b = serde_json::to_string(&simulate(MAIZE, horizon, 42)).unwrap();
    assert_eq!(a, b);

    let c = serde_json::to_string(&simulate(MAIZE, horizon, 43)).unwrap();
    assert_ne!(a, c);
}

#[test]
fn nmin_fertilizes_spring_barley_from_the_soil_balance() {
    let yaml = r#"
name: barley
soil:
  - { thickness: 0.3 }
  - { thickness: 0.3 }
  - { thickness: 0.3 }
nmin:
  enabled: true
rotation:
  - name: barley
    worksteps:
      - { date: "03-25", type: seed, crop: SB }
      - { date: "08-05", type: harvest }
"#;
    let horizon = Horizon::new(ymd(2021, 1, 1), ymd(2021, 12, 31)).unwrap();
    let result = simulate(yaml, horizon, 42);

    let applied: f64 = result.daily[&SeriesMetric::Fertilizer].iter().sum();
    assert!(applied > 0.0);
    assert!((result.cycles[0].metrics[&CropMetric::SumFertilizer] - applied).abs() < 1e-9);
}

#[test]
fn monthly_and_yearly_series_agree() {
    let horizon = Horizon::new(ymd(2020, 1, 1), ymd(2021, 12, 31)).unwrap();
    let result = simulate(MAIZE, horizon, 42);

    let climate = ClimateGenerator::new(ClimateConfig::default(), 52.5)
        .unwrap()
        .generate(&horizon);
    let rain: f64 = climate.iter().map(|w| w.precipitation).sum();
    let monthly_rain: f64 = result
        .values(Granularity::Monthly, SeriesMetric::Precipitation)
        .iter()
        .sum();
    assert!((rain - monthly_rain).abs() < 1e-6);

    for metric in [SeriesMetric::GroundwaterRecharge, SeriesMetric::NitrogenLeaching] {
        let monthly = result.values(Granularity::Monthly, metric);
        let yearly = result.values(Granularity::Yearly, metric);
        assert_eq!(monthly.len(), 24);
        assert_eq!(yearly.len(), 2);
        assert!(monthly.iter().all(|v| *v >= 0.0));
        let difference = monthly.iter().sum::<f64>() - yearly.iter().sum::<f64>();
        assert!(difference.abs() < 1e-6, "{metric:?}");
    }
}
