use tracing::debug;

use super::{AssetRole, Carrier, EnergyNetwork, Generator, Link, Load, Snapshots, Store};
use crate::domain::{Assumptions, JobError, Technology, TechnologyTable};
use crate::reference::ReferenceData;

/// Tie-break costs: curtailing solar is preferred over curtailing wind, and
/// both over destroying stored energy.
pub const SOLAR_MARGINAL_COST: f64 = 0.1;
pub const WIND_MARGINAL_COST: f64 = 0.2;

/// Assembles the single-country network of one job.
pub struct NetworkBuilder<'a> {
    reference: &'a ReferenceData,
}

impl<'a> NetworkBuilder<'a> {
    pub fn new(reference: &'a ReferenceData) -> Self {
        Self { reference }
    }

    pub fn build(
        &self,
        assumptions: &Assumptions,
        costs: &TechnologyTable,
    ) -> Result<EnergyNetwork, JobError> {
        let ct = assumptions.country.as_str();
        let snapshots = Snapshots::for_year(assumptions.year, assumptions.frequency);
        let mut network = EnergyNetwork::new(snapshots);

        network.add_bus(ct, Carrier::Electricity).add_load(Load {
            name: ct.to_string(),
            bus: ct.to_string(),
            p_set: assumptions.load,
        });

        if assumptions.solar {
            let p_max_pu = self.reference.solar_series(ct, &network.snapshots.index)?;
            network.add_generator(Generator {
                name: component(ct, AssetRole::Solar),
                role: AssetRole::Solar,
                bus: ct.to_string(),
                p_max_pu,
                capital_cost: costs.fixed(Technology::Solar),
                marginal_cost: SOLAR_MARGINAL_COST,
            });
        }

        if assumptions.wind {
            let p_max_pu = self.reference.wind_series(ct, &network.snapshots.index)?;
            network.add_generator(Generator {
                name: component(ct, AssetRole::Wind),
                role: AssetRole::Wind,
                bus: ct.to_string(),
                p_max_pu,
                capital_cost: costs.fixed(Technology::Wind),
                marginal_cost: WIND_MARGINAL_COST,
            });
        }

        if assumptions.battery {
            let battery_bus = format!("{ct} battery");
            let efficiency = costs.efficiency(Technology::BatteryPower);
            network
                .add_bus(battery_bus.clone(), Carrier::Battery)
                .add_store(Store {
                    name: component(ct, AssetRole::BatteryEnergy),
                    role: AssetRole::BatteryEnergy,
                    bus: battery_bus.clone(),
                    capital_cost: costs.fixed(Technology::BatteryEnergy),
                    cyclic: true,
                })
                .add_link(Link {
                    name: component(ct, AssetRole::BatteryPower),
                    role: AssetRole::BatteryPower,
                    bus0: ct.to_string(),
                    bus1: battery_bus.clone(),
                    efficiency,
                    capital_cost: costs.fixed(Technology::BatteryPower),
                })
                .add_link(Link {
                    name: component(ct, AssetRole::BatteryDischarge),
                    role: AssetRole::BatteryDischarge,
                    bus0: battery_bus,
                    bus1: ct.to_string(),
                    efficiency,
                    capital_cost: 0.0,
                });
        }

        if assumptions.hydrogen {
            let hydrogen_bus = format!("{ct} hydrogen");
            let turbine_efficiency = costs.efficiency(Technology::HydrogenTurbine);
            network
                .add_bus(hydrogen_bus.clone(), Carrier::Hydrogen)
                .add_link(Link {
                    name: component(ct, AssetRole::HydrogenElectrolyser),
                    role: AssetRole::HydrogenElectrolyser,
                    bus0: ct.to_string(),
                    bus1: hydrogen_bus.clone(),
                    efficiency: costs.efficiency(Technology::HydrogenElectrolyser),
                    capital_cost: costs.fixed(Technology::HydrogenElectrolyser),
                })
                .add_link(Link {
                    name: component(ct, AssetRole::HydrogenTurbine),
                    role: AssetRole::HydrogenTurbine,
                    bus0: hydrogen_bus.clone(),
                    bus1: ct.to_string(),
                    efficiency: turbine_efficiency,
                    // quoted per MW of electrical output, the link is sized on hydrogen input
                    capital_cost: costs.fixed(Technology::HydrogenTurbine) * turbine_efficiency,
                })
                .add_store(Store {
                    name: component(ct, AssetRole::HydrogenEnergy),
                    role: AssetRole::HydrogenEnergy,
                    bus: hydrogen_bus,
                    capital_cost: costs.fixed(Technology::HydrogenEnergy),
                    cyclic: true,
                });
        }

        network.consistency_check()?;

        debug!(
            country = ct,
            snapshots = network.snapshots.len(),
            buses = network.buses.len(),
            generators = network.generators.len(),
            links = network.links.len(),
            stores = network.stores.len(),
            "network assembled"
        );

        Ok(network)
    }
}

/// Component name of an asset in a country, e.g. `"DE battery_power"`.
pub fn component(country: &str, role: AssetRole) -> String {
    format!("{country} {role}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::assumptions::tests::raw_defaults;
    use crate::reference::tests::constant_reference;

    fn build(mutate: impl FnOnce(&mut Assumptions)) -> EnergyNetwork {
        let reference = constant_reference(&["DE"], 0.2, 0.35);
        let mut assumptions = Assumptions::validate(&raw_defaults(), &reference).unwrap();
        mutate(&mut assumptions);
        let costs = TechnologyTable::from_assumptions(&assumptions, 1.0);
        NetworkBuilder::new(&reference).build(&assumptions, &costs).unwrap()
    }

    #[test]
    fn test_load_only_network() {
        let n = build(|a| {
            a.wind = false;
            a.solar = false;
            a.battery = false;
            a.hydrogen = false;
        });
        assert_eq!(n.buses.len(), 1);
        assert_eq!(n.loads[0].p_set, 1000.0);
        assert!(!n.has_assets());
        assert!(!n.has_supply("DE"));
    }

    #[test]
    fn test_generators_carry_profiles_and_tie_breaks() {
        let n = build(|a| a.battery = false);
        let solar = n.generator(AssetRole::Solar).unwrap();
        let wind = n.generator(AssetRole::Wind).unwrap();
        assert_eq!(solar.name, "DE solar");
        assert!(solar.p_max_pu.iter().all(|v| *v == 0.2));
        assert!(wind.p_max_pu.iter().all(|v| *v == 0.35));
        assert!(solar.marginal_cost < wind.marginal_cost);
        assert_eq!(solar.p_max_pu.len(), n.snapshots.len());
    }

    #[test]
    fn test_battery_subsystem() {
        let n = build(|_| {});
        let charge = n.link(AssetRole::BatteryPower).unwrap();
        let discharge = n.link(AssetRole::BatteryDischarge).unwrap();
        let store = n.store(AssetRole::BatteryEnergy).unwrap();
        assert_eq!(charge.bus0, "DE");
        assert_eq!(charge.bus1, "DE battery");
        assert_eq!(discharge.bus0, "DE battery");
        assert_eq!(charge.efficiency, 0.9);
        assert_eq!(discharge.efficiency, 0.9);
        assert!(charge.capital_cost > 0.0);
        assert_eq!(discharge.capital_cost, 0.0);
        assert!(store.cyclic);
        assert_eq!(n.bus("DE battery").unwrap().carrier, Carrier::Battery);
    }

    #[test]
    fn test_hydrogen_turbine_cost_is_scaled_by_efficiency() {
        let n = build(|a| a.hydrogen = true);
        let costs = {
            let reference = constant_reference(&["DE"], 0.2, 0.35);
            let a = Assumptions::validate(&raw_defaults(), &reference).unwrap();
            TechnologyTable::from_assumptions(&a, 1.0)
        };
        let turbine = n.link(AssetRole::HydrogenTurbine).unwrap();
        let electrolyser = n.link(AssetRole::HydrogenElectrolyser).unwrap();
        assert_eq!(turbine.efficiency, 0.6);
        assert_eq!(electrolyser.efficiency, 0.7);
        let expected = costs.fixed(Technology::HydrogenTurbine) * 0.6;
        assert!((turbine.capital_cost - expected).abs() < 1e-9);
        assert_eq!(n.bus("DE hydrogen").unwrap().carrier, Carrier::Hydrogen);
        assert!(n.store(AssetRole::HydrogenEnergy).unwrap().cyclic);
    }
}
