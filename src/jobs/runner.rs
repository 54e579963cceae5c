use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use super::state::{Progress, Transition};
use super::store::{JobId, JobStore};
use crate::domain::{Assumptions, JobError, RawAssumptions, TechnologyTable};
use crate::network::{extra_functionality, NetworkBuilder};
use crate::optimizer::{NetworkSolver, SolvedNetwork};
use crate::reference::ReferenceData;
use crate::results::{extract, ResultRecord, SolveResults};

/// Result of one job: the full payload or the reason it failed.
pub type JobOutcome = Result<SolveResults, JobError>;

/// Costs are annualised over a single modelled year.
const MODELLED_YEARS: f64 = 1.0;

/// Runs jobs end to end: validate, annuitize, build, solve, extract, persist.
pub struct JobRunner {
    reference: Arc<ReferenceData>,
    solver: Arc<dyn NetworkSolver>,
    solver_name: String,
    store: JobStore,
    results_dir: PathBuf,
}

impl JobRunner {
    pub fn new(
        reference: Arc<ReferenceData>,
        solver: Arc<dyn NetworkSolver>,
        solver_name: impl Into<String>,
        store: JobStore,
        results_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            reference,
            solver,
            solver_name: solver_name.into(),
            store,
            results_dir: results_dir.into(),
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Run a queued job to its terminal state. Every failure ends in the
    /// error state with a persisted error record; nothing is retried.
    pub async fn run(&self, job_id: JobId, raw: RawAssumptions) -> JobOutcome {
        let started = Instant::now();
        self.advance(job_id, Transition::Start).await;

        let outcome = self.pipeline(job_id, &raw).await;

        match &outcome {
            Ok(results) => {
                let record = ResultRecord::Finished {
                    jobid: job_id.to_string(),
                    average_cost: results.average_cost,
                };
                if let Err(e) = record.persist(&self.results_dir).await {
                    warn!(%job_id, error = %e, "could not persist result record");
                }
                if let Err(e) = self.store.complete(job_id, Arc::new(results.clone())).await {
                    warn!(%job_id, error = %e, "could not mark job finished");
                }
                info!(
                    %job_id,
                    average_cost = results.average_cost,
                    objective = results.objective,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "job finished"
                );
            }
            Err(err) => {
                error!(%job_id, kind = ?err.kind(), error = %err, "job failed");
                self.fail(job_id, err.to_string()).await;
            }
        }

        outcome
    }

    async fn pipeline(&self, job_id: JobId, raw: &RawAssumptions) -> JobOutcome {
        let assumptions = Assumptions::validate(raw, &self.reference)?;
        info!(
            %job_id,
            country = %assumptions.country,
            year = assumptions.year,
            frequency = assumptions.frequency,
            "assumptions accepted"
        );

        let costs = TechnologyTable::from_assumptions(&assumptions, MODELLED_YEARS);
        let network = NetworkBuilder::new(&self.reference).build(&assumptions, &costs)?;
        let extra = extra_functionality(&assumptions);

        self.advance(job_id, Transition::Progress(Progress::Solving)).await;
        let outcome = self
            .solver
            .solve(&network, &self.solver_name, extra.as_ref())
            .await;
        info!(
            %job_id,
            status = %outcome.status,
            termination = %outcome.termination,
            "solver returned"
        );
        let solution = outcome.into_solution()?;

        self.advance(job_id, Transition::Progress(Progress::Processing)).await;
        Ok(extract(&SolvedNetwork::new(network, solution), &assumptions))
    }

    /// Persist an error record for the job and move it to the error state.
    pub async fn fail(&self, job_id: JobId, message: impl Into<String>) {
        let message = message.into();
        let record = ResultRecord::Error {
            jobid: job_id.to_string(),
            error: message.clone(),
        };
        if let Err(e) = record.persist(&self.results_dir).await {
            warn!(%job_id, error = %e, "could not persist error record");
        }
        self.advance(job_id, Transition::Fail(message)).await;
    }

    /// Progress is best effort; a rejected update never fails the job.
    async fn advance(&self, job_id: JobId, transition: Transition) {
        if let Err(e) = self.store.transition(job_id, transition).await {
            warn!(%job_id, error = %e, "status update rejected");
        }
    }
}
