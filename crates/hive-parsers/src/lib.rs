//! Shared parsing utilities for Slurm job fields.
//!
//! Duration grammar and display formatting live in [`time`], the TRES
//! resource descriptor in [`tres`].

pub mod time;
pub mod tres;

pub use time::{format_duration, is_placeholder, is_unlimited, parse_duration_secs};
pub use tres::{ResourceMap, lookup, lookup_gpu, parse_tres};
