//! Results of a solved job: metric extraction and the persisted record.

pub mod extractor;
pub mod record;

pub use extractor::{extract, HOURS_PER_YEAR, REGISTRY, THRESHOLD};
pub use record::{PowerStack, ResultRecord, SolveResults};
