//! Results extraction
//!
//! Every technology group is described once in [`REGISTRY`]: which assets
//! must be built for it to count as active, which metrics it reports and
//! which columns of the power stacks it fills. A group whose assets are not
//! all above [`THRESHOLD`] reports every metric as exactly zero.

use itertools::Itertools;
use std::collections::BTreeMap;
use tracing::debug;

use super::{PowerStack, SolveResults};
use crate::domain::Assumptions;
use crate::network::AssetRole;
use crate::optimizer::SolvedNetwork;
use crate::reference::TIME_FORMAT;
use AssetRole::*;

/// Capacities at or below this (MW or MWh) are treated as not built.
pub const THRESHOLD: f64 = 0.1;

pub const HOURS_PER_YEAR: f64 = 8760.0;

pub const POSITIVE_COLUMNS: [&str; 4] = ["wind", "solar", "battery", "hydrogen_turbine"];
pub const NEGATIVE_COLUMNS: [&str; 2] = ["battery", "hydrogen_electrolyser"];

pub fn color(column: &str) -> &'static str {
    match column {
        "wind" => "#3B6182",
        "solar" => "#FFFF00",
        "battery" | "battery_power" => "#999999",
        "battery_energy" => "#666666",
        "hydrogen_turbine" => "red",
        "hydrogen_electrolyser" => "cyan",
        "hydrogen_energy" => "magenta",
        _ => "black",
    }
}

/// A time series read off the solved network.
#[derive(Debug, Clone, Copy)]
pub enum Series {
    /// Generator dispatch or link input power.
    Flow(AssetRole),
    /// Link output power at bus1.
    Output(AssetRole),
    /// Store energy level.
    Level(AssetRole),
}

#[derive(Debug, Clone, Copy)]
pub enum Measure {
    Capacity(AssetRole),
    /// Nominal capacity times efficiency, for converters quoted on output.
    OutputCapacity(AssetRole),
    Cost(AssetRole),
    Available(AssetRole),
    Used(Series),
    Curtailment(AssetRole),
    CfAvailable(AssetRole),
    /// Mean of the series over the nominal capacity of the role.
    CfUsed(Series, AssetRole),
    Rmv(AssetRole),
}

impl Measure {
    fn is_capacity(&self) -> bool {
        matches!(self, Measure::Capacity(_) | Measure::OutputCapacity(_))
    }
}

pub struct Descriptor {
    pub name: &'static str,
    pub enabled: fn(&Assumptions) -> bool,
    /// Assets whose capacity must exceed the threshold.
    pub members: &'static [AssetRole],
    pub metrics: &'static [(&'static str, Measure)],
    pub positive: &'static [(&'static str, Series)],
    pub negative: &'static [(&'static str, Series)],
}

const fn generator(
    name: &'static str,
    enabled: fn(&Assumptions) -> bool,
    members: &'static [AssetRole],
    metrics: &'static [(&'static str, Measure)],
    positive: &'static [(&'static str, Series)],
) -> Descriptor {
    Descriptor {
        name,
        enabled,
        members,
        metrics,
        positive,
        negative: &[],
    }
}

pub const REGISTRY: &[Descriptor] = &[
    generator(
        "wind",
        |a| a.wind,
        &[Wind],
        &[
            ("wind_capacity", Measure::Capacity(Wind)),
            ("wind_cost", Measure::Cost(Wind)),
            ("wind_available", Measure::Available(Wind)),
            ("wind_used", Measure::Used(Series::Flow(Wind))),
            ("wind_curtailment", Measure::Curtailment(Wind)),
            ("wind_cf_available", Measure::CfAvailable(Wind)),
            ("wind_cf_used", Measure::CfUsed(Series::Flow(Wind), Wind)),
            ("wind_rmv", Measure::Rmv(Wind)),
        ],
        &[("wind", Series::Flow(Wind))],
    ),
    generator(
        "solar",
        |a| a.solar,
        &[Solar],
        &[
            ("solar_capacity", Measure::Capacity(Solar)),
            ("solar_cost", Measure::Cost(Solar)),
            ("solar_available", Measure::Available(Solar)),
            ("solar_used", Measure::Used(Series::Flow(Solar))),
            ("solar_curtailment", Measure::Curtailment(Solar)),
            ("solar_cf_available", Measure::CfAvailable(Solar)),
            ("solar_cf_used", Measure::CfUsed(Series::Flow(Solar), Solar)),
            ("solar_rmv", Measure::Rmv(Solar)),
        ],
        &[("solar", Series::Flow(Solar))],
    ),
    Descriptor {
        name: "battery",
        enabled: |a| a.battery,
        members: &[BatteryPower, BatteryEnergy],
        metrics: &[
            ("battery_power_capacity", Measure::Capacity(BatteryPower)),
            ("battery_power_cost", Measure::Cost(BatteryPower)),
            ("battery_energy_capacity", Measure::Capacity(BatteryEnergy)),
            ("battery_energy_cost", Measure::Cost(BatteryEnergy)),
            ("battery_power_used", Measure::Used(Series::Flow(BatteryDischarge))),
            (
                "battery_power_cf_used",
                Measure::CfUsed(Series::Flow(BatteryDischarge), BatteryPower),
            ),
            ("battery_energy_used", Measure::Used(Series::Level(BatteryEnergy))),
            (
                "battery_energy_cf_used",
                Measure::CfUsed(Series::Level(BatteryEnergy), BatteryEnergy),
            ),
            ("battery_power_rmv", Measure::Rmv(BatteryPower)),
            ("battery_discharge_rmv", Measure::Rmv(BatteryDischarge)),
        ],
        positive: &[("battery", Series::Output(BatteryDischarge))],
        negative: &[("battery", Series::Flow(BatteryPower))],
    },
    Descriptor {
        name: "hydrogen",
        enabled: |a| a.hydrogen,
        members: &[HydrogenElectrolyser, HydrogenTurbine, HydrogenEnergy],
        metrics: &[
            ("hydrogen_electrolyser_capacity", Measure::Capacity(HydrogenElectrolyser)),
            ("hydrogen_electrolyser_cost", Measure::Cost(HydrogenElectrolyser)),
            ("hydrogen_turbine_capacity", Measure::OutputCapacity(HydrogenTurbine)),
            ("hydrogen_turbine_cost", Measure::Cost(HydrogenTurbine)),
            ("hydrogen_energy_capacity", Measure::Capacity(HydrogenEnergy)),
            ("hydrogen_energy_cost", Measure::Cost(HydrogenEnergy)),
            (
                "hydrogen_electrolyser_used",
                Measure::Used(Series::Flow(HydrogenElectrolyser)),
            ),
            (
                "hydrogen_electrolyser_cf_used",
                Measure::CfUsed(Series::Flow(HydrogenElectrolyser), HydrogenElectrolyser),
            ),
            ("hydrogen_turbine_used", Measure::Used(Series::Flow(HydrogenTurbine))),
            (
                "hydrogen_turbine_cf_used",
                Measure::CfUsed(Series::Flow(HydrogenTurbine), HydrogenTurbine),
            ),
            ("hydrogen_energy_used", Measure::Used(Series::Level(HydrogenEnergy))),
            (
                "hydrogen_energy_cf_used",
                Measure::CfUsed(Series::Level(HydrogenEnergy), HydrogenEnergy),
            ),
            ("hydrogen_turbine_rmv", Measure::Rmv(HydrogenTurbine)),
            ("hydrogen_electrolyser_rmv", Measure::Rmv(HydrogenElectrolyser)),
        ],
        positive: &[("hydrogen_turbine", Series::Output(HydrogenTurbine))],
        negative: &[("hydrogen_electrolyser", Series::Flow(HydrogenElectrolyser))],
    },
];

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

struct Context<'a> {
    solved: &'a SolvedNetwork,
    price: &'a [f64],
    average_price: f64,
    total_weight: f64,
}

impl Context<'_> {
    fn series(&self, series: Series) -> Vec<f64> {
        match series {
            Series::Flow(role) => self.solved.flow(role).to_vec(),
            Series::Output(role) => self.solved.output(role),
            Series::Level(role) => self.solved.energy(role).to_vec(),
        }
    }

    fn measure(&self, measure: Measure) -> f64 {
        let s = self.solved;
        match measure {
            Measure::Capacity(role) => s.nominal(role),
            Measure::OutputCapacity(role) => s.nominal(role) * s.efficiency(role),
            Measure::Cost(role) => ratio(s.nominal(role) * s.capital_cost(role), self.total_weight),
            Measure::Available(role) => s.nominal(role) * mean(s.p_max_pu(role)),
            Measure::Used(series) => mean(&self.series(series)),
            Measure::Curtailment(role) => {
                let available = self.measure(Measure::Available(role));
                let used = mean(s.flow(role));
                ratio(available - used, available)
            }
            Measure::CfAvailable(role) => mean(s.p_max_pu(role)),
            Measure::CfUsed(series, role) => ratio(mean(&self.series(series)), s.nominal(role)),
            Measure::Rmv(role) => {
                let flow = s.flow(role);
                let revenue: f64 = self.price.iter().zip(flow).map(|(p, f)| p * f).sum();
                let dispatched: f64 = flow.iter().sum();
                ratio(ratio(revenue, dispatched), self.average_price)
            }
        }
    }

    fn is_active(&self, descriptor: &Descriptor, assumptions: &Assumptions) -> bool {
        (descriptor.enabled)(assumptions)
            && descriptor.members.iter().all(|role| self.solved.nominal(*role) > THRESHOLD)
            && descriptor
                .metrics
                .iter()
                .filter(|(_, m)| m.is_capacity())
                .all(|(_, m)| self.measure(*m) > THRESHOLD)
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn stack(columns: &[&str], filled: &BTreeMap<&str, Vec<f64>>, snapshots: usize) -> PowerStack {
    let data = (0..snapshots)
        .map(|t| {
            columns
                .iter()
                .map(|c| filled.get(c).and_then(|s| s.get(t)).map_or(0.0, |v| round1(*v)))
                .collect()
        })
        .collect();
    PowerStack {
        columns: columns.iter().map(|c| c.to_string()).collect(),
        data,
        color: columns.iter().map(|c| color(c).to_string()).collect(),
    }
}

/// Derive the result payload of a solved network. Pure in its inputs.
pub fn extract(solved: &SolvedNetwork, assumptions: &Assumptions) -> SolveResults {
    let network = &solved.network;
    let bus = network
        .electricity_bus()
        .map_or(assumptions.country.as_str(), |b| b.name.as_str());
    let price = solved.marginal_price(bus);
    let ctx = Context {
        solved,
        price,
        average_price: mean(price),
        total_weight: network.snapshots.total_weight(),
    };

    let mut metrics = BTreeMap::new();
    let mut positive = BTreeMap::new();
    let mut negative = BTreeMap::new();
    for descriptor in REGISTRY {
        let active = ctx.is_active(descriptor, assumptions);
        debug!(technology = descriptor.name, active, "extracting");
        for (name, measure) in descriptor.metrics {
            let value = if active { ctx.measure(*measure) } else { 0.0 };
            metrics.insert(name.to_string(), value);
        }
        if active {
            positive.extend(descriptor.positive.iter().map(|(c, s)| (*c, ctx.series(*s))));
            negative.extend(descriptor.negative.iter().map(|(c, s)| (*c, ctx.series(*s))));
        }
    }

    let total_cost: f64 = metrics
        .iter()
        .filter(|(name, _)| name.ends_with("_cost"))
        .map(|(_, v)| v)
        .sum();

    let n = network.snapshots.len();
    SolveResults {
        objective: solved.solution.objective / HOURS_PER_YEAR,
        average_price: ctx.average_price,
        average_cost: ratio(total_cost, assumptions.load),
        metrics,
        assumptions: assumptions.clone(),
        snapshots: network
            .snapshots
            .index
            .iter()
            .map(|t| t.format(TIME_FORMAT).to_string())
            .collect_vec(),
        positive: stack(&POSITIVE_COLUMNS, &positive, n),
        negative: stack(&NEGATIVE_COLUMNS, &negative, n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::assumptions::tests::raw_defaults;
    use crate::domain::TechnologyTable;
    use crate::network::{component, NetworkBuilder};
    use crate::optimizer::{GeneratorDispatch, LinkDispatch, NetworkSolution, StoreDispatch};
    use crate::reference::tests::constant_reference;
    use proptest::prelude::*;

    fn assumptions(mutate: impl FnOnce(&mut Assumptions)) -> (SolvedNetwork, Assumptions) {
        let reference = constant_reference(&["DE"], 0.2, 0.5);
        let mut a = Assumptions::validate(&raw_defaults(), &reference).unwrap();
        mutate(&mut a);
        let costs = TechnologyTable::from_assumptions(&a, 1.0);
        let network = NetworkBuilder::new(&reference).build(&a, &costs).unwrap();
        (SolvedNetwork::new(network, NetworkSolution::default()), a)
    }

    fn with_wind(solved: &mut SolvedNetwork, p_nom: f64, p: f64) {
        let n = solved.network.snapshots.len();
        solved.solution.generators.insert(
            component("DE", Wind),
            GeneratorDispatch {
                p_nom_opt: p_nom,
                p: vec![p; n],
            },
        );
        solved.solution.marginal_price.insert("DE".into(), vec![30.0; n]);
    }

    #[test]
    fn test_registry_metric_names_are_unique() {
        let names: Vec<_> = REGISTRY
            .iter()
            .flat_map(|d| d.metrics.iter().map(|(n, _)| *n))
            .collect();
        assert_eq!(names.len(), names.iter().unique().count());
        assert_eq!(names.len(), 40);
    }

    #[test]
    fn test_wind_metrics() {
        let (mut solved, a) = assumptions(|a| {
            a.solar = false;
            a.battery = false;
        });
        with_wind(&mut solved, 4000.0, 1000.0);
        let r = extract(&solved, &a);

        assert_eq!(r.metric("wind_capacity"), 4000.0);
        assert!((r.metric("wind_available") - 2000.0).abs() < 1e-9);
        assert!((r.metric("wind_used") - 1000.0).abs() < 1e-9);
        assert!((r.metric("wind_curtailment") - 0.5).abs() < 1e-9);
        assert!((r.metric("wind_cf_available") - 0.5).abs() < 1e-9);
        assert!((r.metric("wind_cf_used") - 0.25).abs() < 1e-9);
        assert!((r.metric("wind_rmv") - 1.0).abs() < 1e-9);
        assert_eq!(r.average_price, 30.0);

        let wind = solved.network.generator(Wind).unwrap();
        let cost = 4000.0 * wind.capital_cost / solved.network.snapshots.total_weight();
        assert!((r.metric("wind_cost") - cost).abs() < 1e-6);
        assert!((r.average_cost - cost / 1000.0).abs() < 1e-9);
        assert_eq!(r.metric("solar_capacity"), 0.0);
    }

    #[test]
    fn test_below_threshold_reports_zero() {
        let (mut solved, a) = assumptions(|a| a.solar = false);
        with_wind(&mut solved, 0.05, 0.01);
        let r = extract(&solved, &a);
        for (name, value) in &r.metrics {
            assert_eq!(*value, 0.0, "{name}");
        }
        assert_eq!(r.average_cost, 0.0);
        assert!(r.positive.data.iter().flatten().all(|v| *v == 0.0));
    }

    #[test]
    fn test_disabled_technology_ignores_solution() {
        let (mut solved, a) = assumptions(|a| a.wind = false);
        with_wind(&mut solved, 4000.0, 1000.0);
        assert_eq!(extract(&solved, &a).metric("wind_capacity"), 0.0);
    }

    #[test]
    fn test_battery_requires_every_member() {
        let (mut solved, a) = assumptions(|a| a.solar = false);
        with_wind(&mut solved, 4000.0, 1000.0);
        let n = solved.network.snapshots.len();
        solved.solution.links.insert(
            component("DE", BatteryPower),
            LinkDispatch {
                p_nom_opt: 90.0,
                p0: vec![10.0; n],
            },
        );
        solved.solution.links.insert(
            component("DE", BatteryDischarge),
            LinkDispatch {
                p_nom_opt: 100.0,
                p0: vec![9.0; n],
            },
        );
        solved.solution.stores.insert(
            component("DE", BatteryEnergy),
            StoreDispatch {
                e_nom_opt: 0.01,
                e: vec![0.0; n],
                p: vec![0.0; n],
            },
        );
        assert_eq!(extract(&solved, &a).metric("battery_power_capacity"), 0.0);

        if let Some(store) = solved.solution.stores.get_mut(&component("DE", BatteryEnergy)) {
            store.e_nom_opt = 400.0;
            store.e = vec![200.0; n];
        }
        let r = extract(&solved, &a);
        assert_eq!(r.metric("battery_power_capacity"), 90.0);
        assert!((r.metric("battery_power_used") - 9.0).abs() < 1e-9);
        assert!((r.metric("battery_power_cf_used") - 0.1).abs() < 1e-9);
        assert!((r.metric("battery_energy_cf_used") - 0.5).abs() < 1e-9);
        // discharge output is p0 * efficiency
        assert_eq!(r.positive.data[0], vec![1000.0, 0.0, 8.1, 0.0]);
        assert_eq!(r.negative.data[0], vec![10.0, 0.0]);
    }

    #[test]
    fn test_hydrogen_metrics_and_stacks() {
        let (mut solved, a) = assumptions(|a| {
            a.solar = false;
            a.battery = false;
            a.hydrogen = true;
        });
        with_wind(&mut solved, 4000.0, 1000.0);
        let n = solved.network.snapshots.len();
        solved.solution.links.insert(
            component("DE", HydrogenElectrolyser),
            LinkDispatch {
                p_nom_opt: 500.0,
                p0: vec![200.0; n],
            },
        );
        solved.solution.links.insert(
            component("DE", HydrogenTurbine),
            LinkDispatch {
                p_nom_opt: 400.0,
                p0: vec![100.0; n],
            },
        );
        solved.solution.stores.insert(
            component("DE", HydrogenEnergy),
            StoreDispatch {
                e_nom_opt: 10_000.0,
                e: vec![5000.0; n],
                p: vec![0.0; n],
            },
        );
        let r = extract(&solved, &a);

        // turbine capacity is reported on its electrical output
        let turbine = solved.network.link(HydrogenTurbine).unwrap();
        assert_eq!(turbine.efficiency, 0.6);
        assert!((r.metric("hydrogen_turbine_capacity") - 400.0 * 0.6).abs() < 1e-9);
        assert_eq!(r.metric("hydrogen_electrolyser_capacity"), 500.0);
        assert_eq!(r.metric("hydrogen_energy_capacity"), 10_000.0);

        let weight = solved.network.snapshots.total_weight();
        let turbine_cost = 400.0 * turbine.capital_cost / weight;
        assert!((r.metric("hydrogen_turbine_cost") - turbine_cost).abs() < 1e-6);
        let electrolyser = solved.network.link(HydrogenElectrolyser).unwrap();
        let electrolyser_cost = 500.0 * electrolyser.capital_cost / weight;
        assert!((r.metric("hydrogen_electrolyser_cost") - electrolyser_cost).abs() < 1e-6);
        let total: f64 = r
            .metrics
            .iter()
            .filter(|(name, _)| name.ends_with("_cost"))
            .map(|(_, v)| v)
            .sum();
        assert!((r.average_cost - total / a.load).abs() < 1e-9);

        assert!((r.metric("hydrogen_electrolyser_used") - 200.0).abs() < 1e-9);
        assert!((r.metric("hydrogen_electrolyser_cf_used") - 0.4).abs() < 1e-9);
        assert!((r.metric("hydrogen_turbine_cf_used") - 0.25).abs() < 1e-9);
        assert!((r.metric("hydrogen_energy_cf_used") - 0.5).abs() < 1e-9);

        // turbine output is p0 * efficiency
        assert_eq!(r.positive.data[0], vec![1000.0, 0.0, 0.0, 60.0]);
        assert_eq!(r.negative.data[0], vec![0.0, 200.0]);

        // an unbuilt store deactivates the whole chain
        if let Some(store) = solved.solution.stores.get_mut(&component("DE", HydrogenEnergy)) {
            store.e_nom_opt = 0.05;
        }
        let r = extract(&solved, &a);
        for (name, value) in r.metrics.iter().filter(|(n, _)| n.starts_with("hydrogen_")) {
            assert_eq!(*value, 0.0, "{name}");
        }
        assert_eq!(r.positive.data[0][3], 0.0);
        assert_eq!(r.negative.data[0][1], 0.0);
    }

    #[test]
    fn test_stacks_layout() {
        let (mut solved, a) = assumptions(|_| {});
        with_wind(&mut solved, 4000.0, 1000.04);
        let r = extract(&solved, &a);
        assert_eq!(r.positive.columns, POSITIVE_COLUMNS.to_vec());
        assert_eq!(r.negative.columns, NEGATIVE_COLUMNS.to_vec());
        assert_eq!(r.positive.color, vec!["#3B6182", "#FFFF00", "#999999", "red"]);
        assert_eq!(r.negative.color, vec!["#999999", "cyan"]);
        assert_eq!(r.positive.data.len(), r.snapshots.len());
        assert_eq!(r.positive.data[0][0], 1000.0);
        assert_eq!(r.snapshots[0], "2012-01-01 00:00:00");
    }

    #[test]
    fn test_zero_price_keeps_rmv_finite() {
        let (mut solved, a) = assumptions(|a| a.solar = false);
        with_wind(&mut solved, 4000.0, 1000.0);
        let n = solved.network.snapshots.len();
        solved.solution.marginal_price.insert("DE".into(), vec![0.0; n]);
        assert_eq!(extract(&solved, &a).metric("wind_rmv"), 0.0);
    }

    #[test]
    fn test_objective_per_hour() {
        let (mut solved, a) = assumptions(|_| {});
        solved.solution.objective = 8760.0 * 5.0;
        assert_eq!(extract(&solved, &a).objective, 5.0);
    }

    proptest! {
        #[test]
        fn prop_reported_capacities_respect_threshold(
            p_nom in 0.0f64..1.0,
            load in 0.0f64..2000.0,
        ) {
            let (mut solved, mut a) = assumptions(|a| a.solar = false);
            a.load = load;
            with_wind(&mut solved, p_nom, p_nom * 0.3);
            let r = extract(&solved, &a);
            for (name, value) in r.metrics.iter().filter(|(n, _)| n.ends_with("_capacity")) {
                prop_assert!(*value == 0.0 || *value >= THRESHOLD, "{} = {}", name, value);
            }
            prop_assert!(r.average_cost >= 0.0);
            prop_assert!(r.average_cost.is_finite());
        }
    }
}
