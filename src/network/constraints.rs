//! Auxiliary constraints
//!
//! The component model has no notion of two converters forming one physical
//! asset. Extra functionality hooks let a job add capacity couplings that the
//! solver enforces next to the regular network equations.

use serde::Serialize;

use super::{AssetRole, EnergyNetwork};
use crate::domain::Assumptions;

/// `capacity(lhs) == ratio * capacity(rhs)`, both named components.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityCoupling {
    pub lhs: String,
    pub rhs: String,
    pub ratio: f64,
}

/// Hook handed to every solve, whether or not it adds anything.
pub trait ExtraFunctionality: Send + Sync {
    fn name(&self) -> &'static str;

    fn couplings(&self, network: &EnergyNetwork) -> Vec<CapacityCoupling>;
}

pub struct NoExtraFunctionality;

impl ExtraFunctionality for NoExtraFunctionality {
    fn name(&self) -> &'static str {
        "none"
    }

    fn couplings(&self, _network: &EnergyNetwork) -> Vec<CapacityCoupling> {
        Vec::new()
    }
}

/// Sizes the battery charger as `discharger capacity * discharger efficiency`.
pub struct BatteryCapacityCoupling;

impl ExtraFunctionality for BatteryCapacityCoupling {
    fn name(&self) -> &'static str {
        "battery_capacity_coupling"
    }

    fn couplings(&self, network: &EnergyNetwork) -> Vec<CapacityCoupling> {
        match (
            network.link(AssetRole::BatteryPower),
            network.link(AssetRole::BatteryDischarge),
        ) {
            (Some(charge), Some(discharge)) => vec![CapacityCoupling {
                lhs: charge.name.clone(),
                rhs: discharge.name.clone(),
                ratio: discharge.efficiency,
            }],
            _ => Vec::new(),
        }
    }
}

/// The hook matching a job's technology choice.
pub fn extra_functionality(assumptions: &Assumptions) -> Box<dyn ExtraFunctionality> {
    if assumptions.battery {
        Box::new(BatteryCapacityCoupling)
    } else {
        Box::new(NoExtraFunctionality)
    }
}
