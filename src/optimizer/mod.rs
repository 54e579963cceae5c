//! Network optimisation
//!
//! `solver` defines the contract every backend honours and the policy that
//! turns a solver outcome into a job result; `lopf` is the linear optimal
//! power flow backend used in production.

pub mod lopf;
pub mod solver;

pub use lopf::{solve_lopf, LopfSolver, CLARABEL};
pub use solver::*;
