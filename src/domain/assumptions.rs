//! Input validation
//!
//! Raw assumptions arrive as a loosely typed JSON object. `Assumptions::validate`
//! coerces every field and checks its range in a fixed order, stopping at the
//! first failure so that no network is ever built from partially valid input.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{JobError, Technology};
use crate::reference::ReferenceData;

/// Untyped assumptions as submitted by a client.
pub type RawAssumptions = Map<String, Value>;

pub const BOOLEAN_FIELDS: [&str; 4] = ["wind", "solar", "battery", "hydrogen"];

pub const FLOAT_FIELDS: [&str; 11] = [
    "load",
    "wind_cost",
    "solar_cost",
    "battery_energy_cost",
    "battery_power_cost",
    "hydrogen_electrolyser_cost",
    "hydrogen_energy_cost",
    "hydrogen_electrolyser_efficiency",
    "hydrogen_turbine_cost",
    "hydrogen_turbine_efficiency",
    "discount_rate",
];

pub const FLOAT_RANGE: (f64, f64) = (0.0, 1e5);
pub const YEAR_RANGE: (i64, i64) = (1985, 2015);
pub const FREQUENCY_RANGE: (i64, i64) = (1, 8760);

/// Fully typed, range-checked assumptions for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assumptions {
    pub wind: bool,
    pub solar: bool,
    pub battery: bool,
    pub hydrogen: bool,
    /// Constant demand in MW.
    pub load: f64,
    pub wind_cost: f64,
    pub solar_cost: f64,
    pub battery_energy_cost: f64,
    pub battery_power_cost: f64,
    pub hydrogen_electrolyser_cost: f64,
    pub hydrogen_energy_cost: f64,
    /// Percent.
    pub hydrogen_electrolyser_efficiency: f64,
    pub hydrogen_turbine_cost: f64,
    /// Percent.
    pub hydrogen_turbine_efficiency: f64,
    /// Percent.
    pub discount_rate: f64,
    pub country: String,
    pub year: i32,
    /// Hours between snapshots.
    pub frequency: u32,
}

impl Assumptions {
    /// Coerce and range-check raw input.
    ///
    /// Order: booleans, floats, country, year, frequency.
    pub fn validate(raw: &RawAssumptions, reference: &ReferenceData) -> Result<Self, JobError> {
        let mut booleans = [false; BOOLEAN_FIELDS.len()];
        for (slot, key) in booleans.iter_mut().zip(BOOLEAN_FIELDS) {
            *slot = coerce_bool(raw.get(key)).ok_or_else(|| {
                JobError::validation(key, format!("{key} could not be converted to boolean"))
            })?;
        }

        let mut floats = [0.0; FLOAT_FIELDS.len()];
        for (slot, key) in floats.iter_mut().zip(FLOAT_FIELDS) {
            let value = coerce_float(raw.get(key)).ok_or_else(|| {
                JobError::validation(key, format!("{key} could not be converted to float"))
            })?;
            if value < FLOAT_RANGE.0 || value > FLOAT_RANGE.1 {
                return Err(JobError::validation(
                    key,
                    format!("{key} {value} was not in the valid range [0,1e5]"),
                ));
            }
            *slot = value;
        }

        let country = match raw.get("country") {
            Some(Value::String(ct)) => ct.clone(),
            other => describe(other),
        };
        if !reference.has_country(&country) {
            return Err(JobError::InvalidCountry(country));
        }

        let year = coerce_int(raw.get("year")).ok_or_else(|| {
            JobError::InvalidYear(format!(
                "Year {} could not be converted to an integer",
                describe(raw.get("year"))
            ))
        })?;
        if year < YEAR_RANGE.0 || year > YEAR_RANGE.1 {
            return Err(JobError::InvalidYear(format!("Year {year} not in valid range")));
        }

        let frequency = coerce_int(raw.get("frequency")).ok_or_else(|| {
            JobError::InvalidFrequency(format!(
                "Frequency {} could not be converted to an int",
                describe(raw.get("frequency"))
            ))
        })?;
        if frequency < FREQUENCY_RANGE.0 || frequency > FREQUENCY_RANGE.1 {
            return Err(JobError::InvalidFrequency(format!(
                "Frequency {frequency} is not in the valid range [1,8760]"
            )));
        }

        let [wind, solar, battery, hydrogen] = booleans;
        let [
            load,
            wind_cost,
            solar_cost,
            battery_energy_cost,
            battery_power_cost,
            hydrogen_electrolyser_cost,
            hydrogen_energy_cost,
            hydrogen_electrolyser_efficiency,
            hydrogen_turbine_cost,
            hydrogen_turbine_efficiency,
            discount_rate,
        ] = floats;

        Ok(Self {
            wind,
            solar,
            battery,
            hydrogen,
            load,
            wind_cost,
            solar_cost,
            battery_energy_cost,
            battery_power_cost,
            hydrogen_electrolyser_cost,
            hydrogen_energy_cost,
            hydrogen_electrolyser_efficiency,
            hydrogen_turbine_cost,
            hydrogen_turbine_efficiency,
            discount_rate,
            country,
            // both ranges checked above
            year: year as i32,
            frequency: frequency as u32,
        })
    }

    /// Investment cost per kW (or kWh) for a technology class.
    pub fn investment(&self, technology: Technology) -> f64 {
        match technology {
            Technology::Wind => self.wind_cost,
            Technology::Solar => self.solar_cost,
            Technology::HydrogenElectrolyser => self.hydrogen_electrolyser_cost,
            Technology::HydrogenTurbine => self.hydrogen_turbine_cost,
            Technology::HydrogenEnergy => self.hydrogen_energy_cost,
            Technology::BatteryPower => self.battery_power_cost,
            Technology::BatteryEnergy => self.battery_energy_cost,
        }
    }

    /// User supplied efficiency in percent, for the classes that take one.
    pub fn efficiency_percent(&self, technology: Technology) -> Option<f64> {
        match technology {
            Technology::HydrogenElectrolyser => Some(self.hydrogen_electrolyser_efficiency),
            Technology::HydrogenTurbine => Some(self.hydrogen_turbine_efficiency),
            _ => None,
        }
    }

    pub fn any_technology(&self) -> bool {
        self.wind || self.solar || self.battery || self.hydrogen
    }
}

fn coerce_bool(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64()? {
            x if x == 0.0 => Some(false),
            x if x == 1.0 => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn coerce_float(value: Option<&Value>) -> Option<f64> {
    let x = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    x.is_finite().then_some(x)
}

fn coerce_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|x| x.fract() == 0.0 && x.abs() < 1e15)
                .map(|x| x as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn describe(value: Option<&Value>) -> String {
    match value {
        None => "None".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::JobErrorKind;
    use rstest::rstest;
    use serde_json::json;

    pub(crate) fn raw_defaults() -> RawAssumptions {
        let value = json!({
            "wind": true,
            "solar": true,
            "battery": true,
            "hydrogen": false,
            "load": 1000.0,
            "wind_cost": 1200.0,
            "solar_cost": 420.0,
            "battery_energy_cost": 150.0,
            "battery_power_cost": 120.0,
            "hydrogen_electrolyser_cost": 700.0,
            "hydrogen_energy_cost": 0.5,
            "hydrogen_electrolyser_efficiency": 70.0,
            "hydrogen_turbine_cost": 880.0,
            "hydrogen_turbine_efficiency": 60.0,
            "discount_rate": 5.0,
            "country": "DE",
            "year": 2012,
            "frequency": 168
        });
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn reference() -> ReferenceData {
        crate::reference::tests::constant_reference(&["DE", "FR"], 0.3, 0.4)
    }

    fn with(key: &str, value: Value) -> RawAssumptions {
        let mut raw = raw_defaults();
        raw.insert(key.to_string(), value);
        raw
    }

    #[test]
    fn test_valid_assumptions() {
        let a = Assumptions::validate(&raw_defaults(), &reference()).unwrap();
        assert!(a.wind && a.solar && a.battery && !a.hydrogen);
        assert_eq!(a.load, 1000.0);
        assert_eq!(a.year, 2012);
        assert_eq!(a.frequency, 168);
        assert_eq!(a.investment(Technology::BatteryEnergy), 150.0);
        assert_eq!(a.efficiency_percent(Technology::HydrogenTurbine), Some(60.0));
        assert_eq!(a.efficiency_percent(Technology::BatteryPower), None);
    }

    #[test]
    fn test_string_inputs_are_coerced() {
        let mut raw = with("load", json!("250.5"));
        raw.insert("battery".into(), json!("false"));
        raw.insert("year".into(), json!("1999"));
        raw.insert("frequency".into(), json!(3.0));
        let a = Assumptions::validate(&raw, &reference()).unwrap();
        assert_eq!(a.load, 250.5);
        assert!(!a.battery);
        assert_eq!(a.year, 1999);
        assert_eq!(a.frequency, 3);
    }

    #[test]
    fn test_negative_discount_rate_rejected() {
        let raw = with("discount_rate", json!(-1));
        let err = Assumptions::validate(&raw, &reference()).unwrap_err();
        match &err {
            JobError::Validation { field, message } => {
                assert_eq!(field, "discount_rate");
                assert!(message.contains("valid range"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[rstest]
    #[case("wind", json!("maybe"), "wind could not be converted to boolean")]
    #[case("hydrogen", json!(2), "hydrogen could not be converted to boolean")]
    #[case("load", json!("lots"), "load could not be converted to float")]
    #[case("solar_cost", json!(null), "solar_cost could not be converted to float")]
    #[case("wind_cost", json!(100001.0), "wind_cost 100001 was not in the valid range [0,1e5]")]
    fn test_field_errors(#[case] key: &str, #[case] value: Value, #[case] message: &str) {
        let err = Assumptions::validate(&with(key, value), &reference()).unwrap_err();
        assert_eq!(err.kind(), JobErrorKind::ValidationError);
        assert_eq!(err.to_string(), message);
    }

    #[rstest]
    #[case("country", json!("ZZ"), JobErrorKind::InvalidCountry)]
    #[case("year", json!(1800), JobErrorKind::InvalidYear)]
    #[case("year", json!("last year"), JobErrorKind::InvalidYear)]
    #[case("frequency", json!(9000), JobErrorKind::InvalidFrequency)]
    #[case("frequency", json!(0), JobErrorKind::InvalidFrequency)]
    #[case("frequency", json!(2.5), JobErrorKind::InvalidFrequency)]
    fn test_domain_errors(#[case] key: &str, #[case] value: Value, #[case] kind: JobErrorKind) {
        let err = Assumptions::validate(&with(key, value), &reference()).unwrap_err();
        assert_eq!(err.kind(), kind);
    }

    #[test]
    fn test_first_failure_wins() {
        let mut raw = with("country", json!("ZZ"));
        raw.insert("load".into(), json!(-5));
        let err = Assumptions::validate(&raw, &reference()).unwrap_err();
        assert_eq!(err.kind(), JobErrorKind::ValidationError);
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let mut raw = raw_defaults();
        raw.remove("battery");
        let err = Assumptions::validate(&raw, &reference()).unwrap_err();
        assert_eq!(err.to_string(), "battery could not be converted to boolean");
    }

    #[test]
    fn test_error_messages_for_ranges() {
        let err = Assumptions::validate(&with("year", json!(1800)), &reference()).unwrap_err();
        assert_eq!(err.to_string(), "Year 1800 not in valid range");
        let err = Assumptions::validate(&with("frequency", json!(9000)), &reference()).unwrap_err();
        assert_eq!(err.to_string(), "Frequency 9000 is not in the valid range [1,8760]");
    }
}
