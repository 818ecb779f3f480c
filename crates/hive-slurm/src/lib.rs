//! SLURM integration for hive.
//!
//! Decode `squeue --json` output into typed, display-ready jobs.

pub mod sort;
pub mod squeue;
pub mod types;
pub mod value;

pub use sort::{compare_jobs, sort_jobs};
pub use squeue::{SQUEUE_COMMAND, SqueueError, parse_job, parse_squeue_json};
pub use types::{Job, JobState, TimeLimit};
pub use value::TolerantValue;
