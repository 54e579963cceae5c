//! Job lifecycle
//!
//! A job is enqueued with raw assumptions, picked up by one worker and run to
//! a terminal state. Pollers read its status and, once finished, the full
//! results from the shared store.

pub mod queue;
pub mod runner;
pub mod state;
pub mod store;

pub use queue::{JobQueue, JobView, QueueError, UNEXPECTED_FAILURE};
pub use runner::{JobOutcome, JobRunner};
pub use state::{JobState, JobStatus, Progress, Transition, TransitionError, WAITING};
pub use store::{JobEntry, JobId, JobStore, StoreError};
