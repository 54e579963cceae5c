use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use strum::Display;

use crate::domain::JobError;
use crate::network::{AssetRole, EnergyNetwork, ExtraFunctionality};

/// Overall run status reported by a solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SolverStatus {
    Ok,
    Warning,
    Error,
}

/// Why the solver stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TerminationCondition {
    Optimal,
    Infeasible,
    Unbounded,
    Other(String),
}

impl fmt::Display for TerminationCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationCondition::Optimal => write!(f, "optimal"),
            TerminationCondition::Infeasible => write!(f, "infeasible"),
            TerminationCondition::Unbounded => write!(f, "unbounded"),
            TerminationCondition::Other(reason) => write!(f, "{reason}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeneratorDispatch {
    pub p_nom_opt: f64,
    pub p: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LinkDispatch {
    pub p_nom_opt: f64,
    /// Power withdrawn from bus0; bus1 receives `efficiency * p0`.
    pub p0: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreDispatch {
    pub e_nom_opt: f64,
    pub e: Vec<f64>,
    /// Power delivered to the bus, negative while charging.
    pub p: Vec<f64>,
}

/// Optimal capacities, dispatch and prices keyed by component/bus name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkSolution {
    /// Total annualised system cost.
    pub objective: f64,
    pub generators: HashMap<String, GeneratorDispatch>,
    pub links: HashMap<String, LinkDispatch>,
    pub stores: HashMap<String, StoreDispatch>,
    /// Shadow price of each bus balance per snapshot, per MWh.
    pub marginal_price: HashMap<String, Vec<f64>>,
}

/// What a solve returned: status pair and, on success, the solution.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    pub status: SolverStatus,
    pub termination: TerminationCondition,
    pub solution: Option<NetworkSolution>,
}

impl SolveOutcome {
    pub fn optimal(solution: NetworkSolution) -> Self {
        Self {
            status: SolverStatus::Ok,
            termination: TerminationCondition::Optimal,
            solution: Some(solution),
        }
    }

    pub fn infeasible() -> Self {
        Self {
            status: SolverStatus::Ok,
            termination: TerminationCondition::Infeasible,
            solution: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: SolverStatus::Error,
            termination: TerminationCondition::Other(reason.into()),
            solution: None,
        }
    }

    /// Apply the job policy: a non-ok status fails the job, a proven
    /// infeasibility is reported separately, anything else is extracted.
    pub fn into_solution(self) -> Result<NetworkSolution, JobError> {
        if self.status != SolverStatus::Ok {
            return Err(JobError::OptimizationFailed);
        }
        if self.termination == TerminationCondition::Infeasible {
            return Err(JobError::Infeasible);
        }
        self.solution.ok_or(JobError::OptimizationFailed)
    }
}

/// Solves a network. Implementations own everything numerical.
#[async_trait]
pub trait NetworkSolver: Send + Sync {
    async fn solve(
        &self,
        network: &EnergyNetwork,
        solver_name: &str,
        extra: &dyn ExtraFunctionality,
    ) -> SolveOutcome;
}

/// A network together with its solution, addressed by asset role.
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedNetwork {
    pub network: EnergyNetwork,
    pub solution: NetworkSolution,
}

impl SolvedNetwork {
    pub fn new(network: EnergyNetwork, solution: NetworkSolution) -> Self {
        Self { network, solution }
    }

    /// Optimal nominal capacity: MW for generators and links, MWh for stores.
    /// Zero for assets that are not part of the network.
    pub fn nominal(&self, role: AssetRole) -> f64 {
        if let Some(g) = self.network.generator(role) {
            return self.solution.generators.get(&g.name).map_or(0.0, |d| d.p_nom_opt);
        }
        if let Some(l) = self.network.link(role) {
            return self.solution.links.get(&l.name).map_or(0.0, |d| d.p_nom_opt);
        }
        if let Some(s) = self.network.store(role) {
            return self.solution.stores.get(&s.name).map_or(0.0, |d| d.e_nom_opt);
        }
        0.0
    }

    pub fn capital_cost(&self, role: AssetRole) -> f64 {
        self.network
            .generator(role)
            .map(|g| g.capital_cost)
            .or_else(|| self.network.link(role).map(|l| l.capital_cost))
            .or_else(|| self.network.store(role).map(|s| s.capital_cost))
            .unwrap_or(0.0)
    }

    pub fn efficiency(&self, role: AssetRole) -> f64 {
        self.network.link(role).map_or(1.0, |l| l.efficiency)
    }

    /// Availability profile of a generator.
    pub fn p_max_pu(&self, role: AssetRole) -> &[f64] {
        self.network
            .generator(role)
            .map(|g| g.p_max_pu.as_slice())
            .unwrap_or(&[])
    }

    /// Dispatch of a generator, or input power of a link.
    pub fn flow(&self, role: AssetRole) -> &[f64] {
        if let Some(g) = self.network.generator(role) {
            return self.solution.generators.get(&g.name).map(|d| d.p.as_slice()).unwrap_or(&[]);
        }
        if let Some(l) = self.network.link(role) {
            return self.solution.links.get(&l.name).map(|d| d.p0.as_slice()).unwrap_or(&[]);
        }
        &[]
    }

    /// Power a link delivers at bus1.
    pub fn output(&self, role: AssetRole) -> Vec<f64> {
        let efficiency = self.efficiency(role);
        self.flow(role).iter().map(|p0| p0 * efficiency).collect()
    }

    /// Energy level of a store.
    pub fn energy(&self, role: AssetRole) -> &[f64] {
        self.network
            .store(role)
            .and_then(|s| self.solution.stores.get(&s.name))
            .map(|d| d.e.as_slice())
            .unwrap_or(&[])
    }

    pub fn marginal_price(&self, bus: &str) -> &[f64] {
        self.solution
            .marginal_price
            .get(bus)
            .map(|p| p.as_slice())
            .unwrap_or(&[])
    }
}
