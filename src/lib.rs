//! Least-cost capacity expansion of a single-country energy system supplied by
//! wind, solar, batteries and hydrogen storage.

pub mod config;
pub mod domain;
pub mod jobs;
pub mod network;
pub mod optimizer;
pub mod reference;
pub mod results;
pub mod telemetry;
