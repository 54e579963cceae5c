#![allow(dead_code)]

use chrono::{NaiveDateTime, Timelike};
use serde_json::{json, Value};
use whobs_server::domain::RawAssumptions;
use whobs_server::network::Snapshots;
use whobs_server::reference::{ReferenceData, TimeSeriesTable};

/// Hourly 2012 profiles for DE: a daylight-only solar curve and a wind
/// series that never drops to zero.
pub fn synthetic_reference() -> ReferenceData {
    let times: Vec<NaiveDateTime> = Snapshots::for_year(2012, 1).index;
    let solar: Vec<f64> = times
        .iter()
        .map(|t| {
            let h = f64::from(t.hour());
            if (6.0..18.0).contains(&h) {
                ((h - 6.0) / 12.0 * std::f64::consts::PI).sin() * 0.6
            } else {
                0.0
            }
        })
        .collect();
    let wind: Vec<f64> = (0..times.len())
        .map(|i| 0.35 + 0.25 * (i as f64 / 97.0).sin())
        .collect();
    ReferenceData::new(
        TimeSeriesTable::from_columns(times.clone(), vec![("DE".into(), solar)]).unwrap(),
        TimeSeriesTable::from_columns(times, vec![("DE_ON".into(), wind)]).unwrap(),
    )
}

pub fn raw(overrides: Value) -> RawAssumptions {
    let mut base = json!({
        "wind": true,
        "solar": false,
        "battery": false,
        "hydrogen": false,
        "load": 1000,
        "wind_cost": 1200,
        "solar_cost": 420,
        "battery_energy_cost": 150,
        "battery_power_cost": 120,
        "hydrogen_electrolyser_cost": 700,
        "hydrogen_energy_cost": 0.5,
        "hydrogen_electrolyser_efficiency": 70,
        "hydrogen_turbine_cost": 880,
        "hydrogen_turbine_efficiency": 60,
        "discount_rate": 5,
        "country": "DE",
        "year": 2012,
        "frequency": 168
    });
    if let (Some(base), Value::Object(extra)) = (base.as_object_mut(), overrides) {
        base.extend(extra);
    }
    match base {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}
