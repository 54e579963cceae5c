use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::{Assumptions, JobError};

/// Signed dispatch stack for plotting: one row per snapshot, one value per
/// column, rounded to one decimal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerStack {
    pub columns: Vec<String>,
    pub data: Vec<Vec<f64>>,
    pub color: Vec<String>,
}

impl PowerStack {
    pub fn row_sums(&self) -> Vec<f64> {
        self.data.iter().map(|row| row.iter().sum()).collect()
    }

    /// `sum(positive) - sum(negative)` per snapshot.
    pub fn net_balance(positive: &PowerStack, negative: &PowerStack) -> Vec<f64> {
        positive
            .row_sums()
            .into_iter()
            .zip(negative.row_sums())
            .map(|(p, n)| p - n)
            .collect()
    }
}

/// Full result payload of a finished job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolveResults {
    /// Mean hourly total system cost.
    pub objective: f64,
    pub average_price: f64,
    pub average_cost: f64,
    #[serde(flatten)]
    pub metrics: BTreeMap<String, f64>,
    pub assumptions: Assumptions,
    pub snapshots: Vec<String>,
    pub positive: PowerStack,
    pub negative: PowerStack,
}

impl SolveResults {
    /// A per-technology metric such as `wind_capacity`; absent names read 0.
    pub fn metric(&self, name: &str) -> f64 {
        self.metrics.get(name).copied().unwrap_or(0.0)
    }
}

/// Lightweight terminal record written once per job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ResultRecord {
    Finished { jobid: String, average_cost: f64 },
    Error { jobid: String, error: String },
}

impl ResultRecord {
    pub fn jobid(&self) -> &str {
        match self {
            ResultRecord::Finished { jobid, .. } | ResultRecord::Error { jobid, .. } => jobid,
        }
    }

    pub fn path(dir: &Path, jobid: &str) -> PathBuf {
        dir.join(format!("results-{jobid}.json"))
    }

    pub async fn persist(&self, dir: &Path) -> Result<PathBuf, JobError> {
        let path = Self::path(dir, self.jobid());
        let body = serde_json::to_vec(self).map_err(|e| JobError::Persistence(e.to_string()))?;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| JobError::Persistence(format!("{}: {e}", dir.display())))?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| JobError::Persistence(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "result record written");
        Ok(path)
    }

    pub async fn read(dir: &Path, jobid: &str) -> Result<Self, JobError> {
        let path = Self::path(dir, jobid);
        let body = tokio::fs::read(&path)
            .await
            .map_err(|e| JobError::Persistence(format!("{}: {e}", path.display())))?;
        serde_json::from_slice(&body).map_err(|e| JobError::Persistence(e.to_string()))
    }
}
