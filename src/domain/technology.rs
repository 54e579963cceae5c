//! Technology classes and cost annuitisation
//!
//! Every investable asset class carries a lifetime, a fixed O&M share and an
//! efficiency. Together with the user's investment cost and discount rate they
//! collapse into one annualised fixed cost per unit of capacity, which is the
//! `capital_cost` handed to the network.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{AsRefStr, Display, EnumIter, IntoEnumIterator};

use super::Assumptions;

/// Fixed O&M in percent of investment per year, identical for every class.
pub const FOM_PERCENT: f64 = 3.0;

/// Converts the per-kW convention of the inputs to the per-MW convention of the model.
pub const PER_KW_TO_PER_MW: f64 = 1000.0;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    AsRefStr,
    Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Technology {
    Wind,
    Solar,
    HydrogenElectrolyser,
    HydrogenTurbine,
    HydrogenEnergy,
    BatteryPower,
    BatteryEnergy,
}

impl Technology {
    /// Economic lifetime in years.
    pub fn lifetime(self) -> f64 {
        match self {
            Technology::HydrogenElectrolyser => 20.0,
            Technology::BatteryPower | Technology::BatteryEnergy => 15.0,
            _ => 25.0,
        }
    }

    /// Efficiency used when the assumptions do not provide one.
    pub fn default_efficiency(self) -> f64 {
        match self {
            Technology::BatteryPower => 0.9,
            _ => 1.0,
        }
    }
}

/// Annuity factor: the share of an investment paid back every year.
///
/// Falls back to straight-line amortisation when the rate is zero.
pub fn annuity(lifetime: f64, rate: f64) -> f64 {
    if rate == 0.0 {
        1.0 / lifetime
    } else {
        rate / (1.0 - 1.0 / (1.0 + rate).powf(lifetime))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TechnologyAssumption {
    pub lifetime: f64,
    /// Fraction, not percent.
    pub discount_rate: f64,
    pub fom: f64,
    /// Currency per MW (or MWh for energy stores).
    pub investment: f64,
    pub efficiency: f64,
    /// Annualised fixed cost per unit of capacity over the simulated years.
    pub fixed: f64,
}

impl TechnologyAssumption {
    pub fn new(
        technology: Technology,
        investment_per_kw: f64,
        discount_rate: f64,
        efficiency: f64,
        n_years: f64,
    ) -> Self {
        let lifetime = technology.lifetime();
        let investment = investment_per_kw * PER_KW_TO_PER_MW;
        let fixed = (annuity(lifetime, discount_rate) + FOM_PERCENT / 100.0) * investment * n_years;
        Self {
            lifetime,
            discount_rate,
            fom: FOM_PERCENT,
            investment,
            efficiency,
            fixed,
        }
    }
}

/// The cost table of one job, one row per technology class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechnologyTable {
    rows: BTreeMap<Technology, TechnologyAssumption>,
}

impl TechnologyTable {
    /// Annuitise every class from validated assumptions.
    pub fn from_assumptions(assumptions: &Assumptions, n_years: f64) -> Self {
        let discount_rate = assumptions.discount_rate / 100.0;
        let rows = Technology::iter()
            .map(|technology| {
                let efficiency = assumptions
                    .efficiency_percent(technology)
                    .map(|percent| percent / 100.0)
                    .unwrap_or_else(|| technology.default_efficiency());
                let row = TechnologyAssumption::new(
                    technology,
                    assumptions.investment(technology),
                    discount_rate,
                    efficiency,
                    n_years,
                );
                (technology, row)
            })
            .collect();
        Self { rows }
    }

    pub fn get(&self, technology: Technology) -> &TechnologyAssumption {
        // every variant is inserted in from_assumptions
        &self.rows[&technology]
    }

    pub fn fixed(&self, technology: Technology) -> f64 {
        self.get(technology).fixed
    }

    pub fn efficiency(&self, technology: Technology) -> f64 {
        self.get(technology).efficiency
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Technology, &TechnologyAssumption)> {
        self.rows.iter()
    }
}
