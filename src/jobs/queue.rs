use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::runner::JobRunner;
use super::state::{JobState, Transition, WAITING};
use super::store::{JobId, JobStore};
use crate::domain::RawAssumptions;
use crate::results::SolveResults;

/// Error text for a job whose task panicked.
pub const UNEXPECTED_FAILURE: &str = "Job failed unexpectedly";

#[derive(Debug)]
struct JobRequest {
    job_id: JobId,
    raw: RawAssumptions,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("job queue is closed")]
    Closed,
}

/// What a poller gets back for a job id.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub results: Option<Arc<SolveResults>>,
}

impl JobView {
    fn waiting() -> Self {
        JobView {
            status: WAITING.to_string(),
            error: None,
            results: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status == "Finished" || self.status == "Error"
    }
}

/// Enqueue/fetch boundary in front of a pool of job workers.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<JobRequest>,
    store: JobStore,
}

impl JobQueue {
    /// Spawn `workers` tasks draining a channel of `capacity` pending jobs.
    /// Workers stop once every queue handle is dropped and the channel is empty.
    pub fn start(
        runner: Arc<JobRunner>,
        workers: usize,
        capacity: usize,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let store = runner.store().clone();

        let handles = (0..workers.max(1))
            .map(|worker| tokio::spawn(worker_loop(worker, runner.clone(), receiver.clone())))
            .collect();

        info!(workers = workers.max(1), capacity, "job workers started");
        (JobQueue { sender, store }, handles)
    }

    pub async fn enqueue(&self, raw: RawAssumptions) -> Result<JobId, QueueError> {
        let job_id = self.store.create_queued_job().await;
        if self.sender.send(JobRequest { job_id, raw }).await.is_err() {
            let failed = self
                .store
                .transition(job_id, Transition::Fail(QueueError::Closed.to_string()))
                .await;
            if let Err(e) = failed {
                warn!(%job_id, error = %e, "could not fail job on closed queue");
            }
            return Err(QueueError::Closed);
        }
        debug!(%job_id, "job enqueued");
        Ok(job_id)
    }

    /// Never fails: unknown or culled jobs read as waiting.
    pub async fn fetch(&self, job_id: JobId) -> JobView {
        let Some(entry) = self.store.entry(job_id).await else {
            return JobView::waiting();
        };
        JobView {
            status: entry.status.status_text(),
            error: match entry.status.state {
                JobState::Error => entry.status.detail,
                _ => None,
            },
            results: entry.results,
        }
    }

    pub async fn active_jobs(&self) -> Vec<JobId> {
        self.store.active_jobs().await
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }
}

async fn worker_loop(
    worker: usize,
    runner: Arc<JobRunner>,
    receiver: Arc<Mutex<mpsc::Receiver<JobRequest>>>,
) {
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(JobRequest { job_id, raw }) = next else {
            break;
        };
        debug!(worker, %job_id, "job picked up");

        // a panicking job must not take the worker down
        let job = {
            let runner = runner.clone();
            tokio::spawn(async move { runner.run(job_id, raw).await })
        };
        if let Err(e) = job.await {
            error!(worker, %job_id, error = %e, "job aborted");
            runner.fail(job_id, UNEXPECTED_FAILURE).await;
        }
    }
    debug!(worker, "job worker stopped");
}
