//! Energy network components
//!
//! A deliberately small component model: buses balance energy per snapshot,
//! loads draw a constant power, generators inject up to an availability
//! profile, links convert between two buses with an efficiency and stores
//! shift energy in time. Every generator, link and store capacity is a
//! decision variable of the optimisation.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::HashSet;
use strum::{AsRefStr, Display, EnumIter};

use crate::domain::JobError;

/// Time index of a network with one weighting (in hours) per snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshots {
    pub index: Vec<NaiveDateTime>,
    pub weightings: Vec<f64>,
}

impl Snapshots {
    /// Every `frequency_hours`-th hour from Jan 1st 00:00 to Dec 31st 23:00,
    /// each weighted by `frequency_hours`.
    pub fn for_year(year: i32, frequency_hours: u32) -> Self {
        let (Some(start), Some(end)) = (
            NaiveDate::from_ymd_opt(year, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0)),
            NaiveDate::from_ymd_opt(year, 12, 31).and_then(|d| d.and_hms_opt(23, 0, 0)),
        ) else {
            return Self::default();
        };
        let step = Duration::hours(i64::from(frequency_hours.max(1)));
        let index: Vec<NaiveDateTime> =
            std::iter::successors(Some(start), |t| Some(*t + step).filter(|next| *next <= end))
                .collect();
        let weightings = vec![f64::from(frequency_hours.max(1)); index.len()];
        Self { index, weightings }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Sum of all weightings, i.e. the number of hours represented.
    pub fn total_weight(&self) -> f64 {
        self.weightings.iter().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr)]
pub enum Carrier {
    #[strum(serialize = "AC")]
    Electricity,
    #[strum(serialize = "battery")]
    Battery,
    #[strum(serialize = "hydrogen")]
    Hydrogen,
}

/// What an asset stands for in the system; the suffix of its component name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum AssetRole {
    Wind,
    Solar,
    /// Charging converter, bus -> battery.
    BatteryPower,
    /// Discharging converter, battery -> bus.
    BatteryDischarge,
    BatteryEnergy,
    HydrogenElectrolyser,
    HydrogenTurbine,
    HydrogenEnergy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bus {
    pub name: String,
    pub carrier: Carrier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Load {
    pub name: String,
    pub bus: String,
    /// MW, constant over all snapshots.
    pub p_set: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Generator {
    pub name: String,
    pub role: AssetRole,
    pub bus: String,
    /// Per-unit availability at each snapshot.
    pub p_max_pu: Vec<f64>,
    /// Annualised cost per MW.
    pub capital_cost: f64,
    /// Cost per MWh dispatched.
    pub marginal_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub name: String,
    pub role: AssetRole,
    pub bus0: String,
    pub bus1: String,
    pub efficiency: f64,
    /// Annualised cost per MW of input (bus0) capacity.
    pub capital_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Store {
    pub name: String,
    pub role: AssetRole,
    pub bus: String,
    /// Annualised cost per MWh.
    pub capital_cost: f64,
    /// State of charge at the first snapshot follows from the last one.
    pub cyclic: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnergyNetwork {
    pub snapshots: Snapshots,
    pub buses: Vec<Bus>,
    pub loads: Vec<Load>,
    pub generators: Vec<Generator>,
    pub links: Vec<Link>,
    pub stores: Vec<Store>,
}

impl EnergyNetwork {
    pub fn new(snapshots: Snapshots) -> Self {
        Self {
            snapshots,
            ..Default::default()
        }
    }

    pub fn add_bus(&mut self, name: impl Into<String>, carrier: Carrier) -> &mut Self {
        self.buses.push(Bus {
            name: name.into(),
            carrier,
        });
        self
    }

    pub fn add_load(&mut self, load: Load) -> &mut Self {
        self.loads.push(load);
        self
    }

    pub fn add_generator(&mut self, generator: Generator) -> &mut Self {
        self.generators.push(generator);
        self
    }

    pub fn add_link(&mut self, link: Link) -> &mut Self {
        self.links.push(link);
        self
    }

    pub fn add_store(&mut self, store: Store) -> &mut Self {
        self.stores.push(store);
        self
    }

    pub fn bus(&self, name: &str) -> Option<&Bus> {
        self.buses.iter().find(|b| b.name == name)
    }

    /// The first electricity bus, where load and generators sit.
    pub fn electricity_bus(&self) -> Option<&Bus> {
        self.buses.iter().find(|b| b.carrier == Carrier::Electricity)
    }

    pub fn generator(&self, role: AssetRole) -> Option<&Generator> {
        self.generators.iter().find(|g| g.role == role)
    }

    pub fn link(&self, role: AssetRole) -> Option<&Link> {
        self.links.iter().find(|l| l.role == role)
    }

    pub fn store(&self, role: AssetRole) -> Option<&Store> {
        self.stores.iter().find(|s| s.role == role)
    }

    /// Total load on a bus.
    pub fn load_on(&self, bus: &str) -> f64 {
        self.loads.iter().filter(|l| l.bus == bus).map(|l| l.p_set).sum()
    }

    /// Whether anything can inject energy into `bus`.
    pub fn has_supply(&self, bus: &str) -> bool {
        self.generators.iter().any(|g| g.bus == bus)
            || self.links.iter().any(|l| l.bus1 == bus)
            || self.stores.iter().any(|s| s.bus == bus)
    }

    /// Whether the optimisation carries any decision variable at all.
    pub fn has_assets(&self) -> bool {
        !(self.generators.is_empty() && self.links.is_empty() && self.stores.is_empty())
    }

    /// Structural check before solving: unique names, known buses, aligned
    /// series and finite parameters.
    pub fn consistency_check(&self) -> Result<(), JobError> {
        let fail = |msg: String| Err(JobError::ModelConsistency(msg));

        if self.snapshots.is_empty() {
            return fail("network has no snapshots".into());
        }
        if self.snapshots.weightings.len() != self.snapshots.len() {
            return fail("snapshot weightings do not match snapshots".into());
        }
        if self.snapshots.weightings.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            return fail("snapshot weightings must be positive".into());
        }

        let mut buses = HashSet::new();
        for bus in &self.buses {
            if !buses.insert(bus.name.as_str()) {
                return fail(format!("duplicate bus {}", bus.name));
            }
        }
        let known = |bus: &str| buses.contains(bus);

        let mut names = HashSet::new();
        let component_names = self
            .loads
            .iter()
            .map(|l| &l.name)
            .chain(self.generators.iter().map(|g| &g.name))
            .chain(self.links.iter().map(|l| &l.name))
            .chain(self.stores.iter().map(|s| &s.name));
        for name in component_names {
            if !names.insert(name.as_str()) {
                return fail(format!("duplicate component {name}"));
            }
        }

        for load in &self.loads {
            if !known(load.bus.as_str()) {
                return fail(format!("load {} attached to unknown bus {}", load.name, load.bus));
            }
            if !load.p_set.is_finite() || load.p_set < 0.0 {
                return fail(format!("load {} has invalid p_set {}", load.name, load.p_set));
            }
        }

        for g in &self.generators {
            if !known(g.bus.as_str()) {
                return fail(format!("generator {} attached to unknown bus {}", g.name, g.bus));
            }
            if g.p_max_pu.len() != self.snapshots.len() {
                return fail(format!(
                    "generator {} has {} availability values for {} snapshots",
                    g.name,
                    g.p_max_pu.len(),
                    self.snapshots.len()
                ));
            }
            if g.p_max_pu.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return fail(format!("generator {} has invalid availability values", g.name));
            }
            check_cost(&g.name, g.capital_cost)?;
            check_cost(&g.name, g.marginal_cost)?;
        }

        for l in &self.links {
            for bus in [&l.bus0, &l.bus1] {
                if !known(bus.as_str()) {
                    return fail(format!("link {} attached to unknown bus {}", l.name, bus));
                }
            }
            if l.bus0 == l.bus1 {
                return fail(format!("link {} connects bus {} to itself", l.name, l.bus0));
            }
            if !l.efficiency.is_finite() || l.efficiency < 0.0 {
                return fail(format!("link {} has invalid efficiency {}", l.name, l.efficiency));
            }
            check_cost(&l.name, l.capital_cost)?;
        }

        for s in &self.stores {
            if !known(s.bus.as_str()) {
                return fail(format!("store {} attached to unknown bus {}", s.name, s.bus));
            }
            check_cost(&s.name, s.capital_cost)?;
        }

        Ok(())
    }
}

fn check_cost(component: &str, cost: f64) -> Result<(), JobError> {
    if cost.is_finite() && cost >= 0.0 {
        Ok(())
    } else {
        Err(JobError::ModelConsistency(format!("{component} has invalid cost {cost}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_network() -> EnergyNetwork {
        let mut n = EnergyNetwork::new(Snapshots::for_year(2012, 24 * 7));
        n.add_bus("DE", Carrier::Electricity);
        n.add_load(Load {
            name: "DE".into(),
            bus: "DE".into(),
            p_set: 100.0,
        });
        n.add_generator(Generator {
            name: "DE wind".into(),
            role: AssetRole::Wind,
            bus: "DE".into(),
            p_max_pu: vec![0.5; n.snapshots.len()],
            capital_cost: 10.0,
            marginal_cost: 0.2,
        });
        n
    }

    #[test]
    fn test_snapshots_cover_the_year() {
        let hourly = Snapshots::for_year(2011, 1);
        assert_eq!(hourly.len(), 8760);
        assert_eq!(hourly.total_weight(), 8760.0);

        let leap = Snapshots::for_year(2012, 1);
        assert_eq!(leap.len(), 8784);

        let weekly = Snapshots::for_year(2012, 168);
        assert_eq!(weekly.len(), 53);
        assert!(weekly.weightings.iter().all(|w| *w == 168.0));
        assert_eq!(weekly.index[1] - weekly.index[0], Duration::hours(168));

        let once = Snapshots::for_year(1985, 8760);
        assert_eq!(once.len(), 1);
    }

    #[test]
    fn test_consistent_network_passes() {
        let n = small_network();
        assert!(n.consistency_check().is_ok());
        assert!(n.has_supply("DE"));
        assert_eq!(n.load_on("DE"), 100.0);
        assert_eq!(n.electricity_bus().map(|b| b.name.as_str()), Some("DE"));
        assert_eq!(AssetRole::BatteryDischarge.to_string(), "battery_discharge");
        assert_eq!(Carrier::Electricity.to_string(), "AC");
    }

    #[test]
    fn test_unknown_bus_is_detected() {
        let mut n = small_network();
        n.add_store(Store {
            name: "DE battery_energy".into(),
            role: AssetRole::BatteryEnergy,
            bus: "DE battery".into(),
            capital_cost: 1.0,
            cyclic: true,
        });
        let err = n.consistency_check().unwrap_err();
        assert!(matches!(err, JobError::ModelConsistency(_)));
    }

    #[test]
    fn test_misaligned_series_is_detected() {
        let mut n = small_network();
        n.generators[0].p_max_pu.pop();
        assert!(n.consistency_check().is_err());
    }

    #[test]
    fn test_duplicate_component_is_detected() {
        let mut n = small_network();
        let dup = n.generators[0].clone();
        n.add_generator(dup);
        assert!(n.consistency_check().is_err());
    }
}
