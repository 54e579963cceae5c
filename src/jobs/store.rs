use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::state::{JobStatus, Transition, TransitionError};
use crate::results::SolveResults;

pub type JobId = Uuid;

pub const DEFAULT_FINISHED_JOB_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no such job {0}")]
    NoSuchJob(JobId),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

#[derive(Debug, Clone, Default)]
pub struct JobEntry {
    pub status: JobStatus,
    /// Full payload, present once the job finished.
    pub results: Option<Arc<SolveResults>>,
    created: u64,
}

#[derive(Default)]
struct Jobs {
    entries: HashMap<JobId, JobEntry>,
    /// Terminal jobs, oldest first.
    finished: VecDeque<JobId>,
    next_seq: u64,
}

/// Status and results of every job, shared between workers and pollers.
/// Each job is written only by the worker that runs it.
#[derive(Clone)]
pub struct JobStore {
    finished_job_capacity: usize,
    jobs: Arc<RwLock<Jobs>>,
}

impl Default for JobStore {
    fn default() -> Self {
        JobStore::new(DEFAULT_FINISHED_JOB_CAPACITY)
    }
}

impl JobStore {
    pub fn new(finished_job_capacity: usize) -> Self {
        JobStore {
            finished_job_capacity: finished_job_capacity.max(1),
            jobs: Arc::new(RwLock::new(Jobs::default())),
        }
    }

    pub async fn create_queued_job(&self) -> JobId {
        let job_id = Uuid::new_v4();
        let mut jobs = self.jobs.write().await;
        let created = jobs.next_seq;
        jobs.next_seq += 1;
        jobs.entries.insert(
            job_id,
            JobEntry {
                status: JobStatus::queued(),
                results: None,
                created,
            },
        );
        job_id
    }

    pub async fn status(&self, job_id: JobId) -> Option<JobStatus> {
        self.jobs.read().await.entries.get(&job_id).map(|e| e.status.clone())
    }

    pub async fn entry(&self, job_id: JobId) -> Option<JobEntry> {
        self.jobs.read().await.entries.get(&job_id).cloned()
    }

    pub async fn transition(
        &self,
        job_id: JobId,
        transition: Transition,
    ) -> Result<JobStatus, StoreError> {
        self.update(job_id, transition, None).await
    }

    /// Attach the results and finish the job in one step, so no poller sees
    /// a finished job without results.
    pub async fn complete(
        &self,
        job_id: JobId,
        results: Arc<SolveResults>,
    ) -> Result<JobStatus, StoreError> {
        self.update(job_id, Transition::Finish, Some(results)).await
    }

    async fn update(
        &self,
        job_id: JobId,
        transition: Transition,
        results: Option<Arc<SolveResults>>,
    ) -> Result<JobStatus, StoreError> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs.entries.get_mut(&job_id).ok_or(StoreError::NoSuchJob(job_id))?;
        let status = entry.status.apply(transition)?;
        entry.status = status.clone();
        if results.is_some() {
            entry.results = results;
        }
        if status.is_terminal() {
            jobs.finished.push_back(job_id);
            Self::cull_finished(&mut jobs, self.finished_job_capacity);
        }
        Ok(status)
    }

    fn cull_finished(jobs: &mut Jobs, capacity: usize) {
        while jobs.finished.len() > capacity {
            if let Some(oldest) = jobs.finished.pop_front() {
                jobs.entries.remove(&oldest);
            }
        }
    }

    /// Queued and running jobs in submission order.
    pub async fn active_jobs(&self) -> Vec<JobId> {
        let jobs = self.jobs.read().await;
        let mut active: Vec<(u64, JobId)> = jobs
            .entries
            .iter()
            .filter(|(_, e)| !e.status.is_terminal())
            .map(|(id, e)| (e.created, *id))
            .collect();
        active.sort_unstable();
        active.into_iter().map(|(_, id)| id).collect()
    }
}
