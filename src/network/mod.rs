//! Energy network model
//!
//! Component model, the per-job builder and the auxiliary constraint hooks
//! that are handed to the solver together with the network.

pub mod builder;
pub mod constraints;
pub mod model;

pub use builder::{component, NetworkBuilder, SOLAR_MARGINAL_COST, WIND_MARGINAL_COST};
pub use constraints::{
    extra_functionality, BatteryCapacityCoupling, CapacityCoupling, ExtraFunctionality,
    NoExtraFunctionality,
};
pub use model::*;
