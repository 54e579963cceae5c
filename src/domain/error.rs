use serde::Serialize;
use thiserror::Error;

/// Everything that can end a job in the `Error` state.
///
/// Validation-class variants are raised before any network is built and
/// carry the offending value. Solver-class variants are raised only after a
/// full build and solve attempt and never expose partial numbers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JobError {
    #[error("{message}")]
    Validation { field: String, message: String },

    #[error("Country {0} not found among valid countries")]
    InvalidCountry(String),

    #[error("{0}")]
    InvalidYear(String),

    #[error("{0}")]
    InvalidFrequency(String),

    #[error("Model consistency check failed: {0}")]
    ModelConsistency(String),

    #[error("Reference data error: {0}")]
    ReferenceData(String),

    #[error("Job failed to optimise correctly")]
    OptimizationFailed,

    #[error("Problem was infeasible")]
    Infeasible,

    #[error("Could not persist result record: {0}")]
    Persistence(String),
}

/// Coarse classification used in logs and job views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobErrorKind {
    ValidationError,
    InvalidCountry,
    InvalidYear,
    InvalidFrequency,
    ModelConsistencyError,
    ReferenceDataError,
    OptimizationFailed,
    Infeasible,
    PersistenceError,
}

impl JobError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        JobError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> JobErrorKind {
        match self {
            JobError::Validation { .. } => JobErrorKind::ValidationError,
            JobError::InvalidCountry(_) => JobErrorKind::InvalidCountry,
            JobError::InvalidYear(_) => JobErrorKind::InvalidYear,
            JobError::InvalidFrequency(_) => JobErrorKind::InvalidFrequency,
            JobError::ModelConsistency(_) => JobErrorKind::ModelConsistencyError,
            JobError::ReferenceData(_) => JobErrorKind::ReferenceDataError,
            JobError::OptimizationFailed => JobErrorKind::OptimizationFailed,
            JobError::Infeasible => JobErrorKind::Infeasible,
            JobError::Persistence(_) => JobErrorKind::PersistenceError,
        }
    }

    /// True for errors caused by the submitted assumptions rather than by the
    /// model, the solver or the host.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            JobError::Validation { .. }
                | JobError::InvalidCountry(_)
                | JobError::InvalidYear(_)
                | JobError::InvalidFrequency(_)
        )
    }
}
