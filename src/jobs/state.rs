use serde::Serialize;
use std::fmt;
use strum::{Display, EnumIter};
use thiserror::Error;

/// Reported for jobs that are queued, unknown or not yet started.
pub const WAITING: &str = "Waiting for job to run";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
pub enum JobState {
    Queued,
    Running,
    Finished,
    Error,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Finished | JobState::Error)
    }
}

/// Stages of a running job, in the order they are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Display, EnumIter)]
pub enum Progress {
    #[strum(serialize = "Reading in data")]
    ReadingData,
    #[strum(serialize = "Solving optimisation problem")]
    Solving,
    #[strum(serialize = "Finished solving, processing and sending results")]
    Processing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Start,
    Progress(Progress),
    Finish,
    Fail(String),
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Start => write!(f, "start"),
            Transition::Progress(p) => write!(f, "progress to {p:?}"),
            Transition::Finish => write!(f, "finish"),
            Transition::Fail(_) => write!(f, "fail"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal transition {transition} from {from}")]
pub struct TransitionError {
    pub from: JobState,
    pub transition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    pub state: JobState,
    pub progress: Option<Progress>,
    /// Failure message, set only in the error state.
    pub detail: Option<String>,
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::queued()
    }
}

impl JobStatus {
    pub fn queued() -> Self {
        JobStatus {
            state: JobState::Queued,
            progress: None,
            detail: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// The only way a status changes. Progress only moves forward and
    /// terminal states are final.
    pub fn apply(&self, transition: Transition) -> Result<JobStatus, TransitionError> {
        let illegal = |t: &Transition| TransitionError {
            from: self.state,
            transition: t.to_string(),
        };
        match (self.state, &transition) {
            (JobState::Queued, Transition::Start) => Ok(JobStatus {
                state: JobState::Running,
                progress: Some(Progress::ReadingData),
                detail: None,
            }),
            (JobState::Running, Transition::Progress(next))
                if self.progress.map_or(true, |p| *next > p) =>
            {
                Ok(JobStatus {
                    progress: Some(*next),
                    ..self.clone()
                })
            }
            (JobState::Running, Transition::Finish) => Ok(JobStatus {
                state: JobState::Finished,
                progress: None,
                detail: None,
            }),
            (JobState::Queued | JobState::Running, Transition::Fail(message)) => Ok(JobStatus {
                state: JobState::Error,
                progress: None,
                detail: Some(message.clone()),
            }),
            _ => Err(illegal(&transition)),
        }
    }

    /// What a poller sees in the `status` field.
    pub fn status_text(&self) -> String {
        match (self.state, self.progress) {
            (JobState::Queued, _) => WAITING.to_string(),
            (JobState::Running, Some(progress)) => progress.to_string(),
            (JobState::Running, None) => WAITING.to_string(),
            (JobState::Finished, _) => "Finished".to_string(),
            (JobState::Error, _) => "Error".to_string(),
        }
    }
}
