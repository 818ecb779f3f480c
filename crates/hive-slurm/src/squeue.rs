//! Decode `squeue --json` output into jobs.
//!
//! The top-level shape (`{"jobs": [...]}`) is required. Inside each record
//! every field goes through the tolerant decoder, so a single odd field
//! never rejects the whole response.

use crate::types::{Job, JobState, TimeLimit};
use crate::value::{TolerantValue, tolerant_int, tolerant_string, tolerant_string_list};
use chrono::{DateTime, Utc};
use hive_parsers::{is_unlimited, parse_duration_secs, parse_tres};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Default remote command.
pub const SQUEUE_COMMAND: &str = "squeue --me --json";

/// Slurm's sentinel values for 32-bit numeric fields.
const SLURM_INFINITE: i64 = u32::MAX as i64;
const SLURM_NO_VAL: i64 = u32::MAX as i64 - 1;

#[derive(Error, Debug)]
pub enum SqueueError {
    #[error("Failed to parse squeue output: {0}")]
    ParseError(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct SqueueResponse {
    jobs: Vec<Value>,

    #[serde(default)]
    errors: Vec<Value>,
}

/// Parse the raw stdout of `squeue --json`.
///
/// `now` anchors elapsed time for running jobs that only report a start
/// timestamp.
pub fn parse_squeue_json(bytes: &[u8], now: DateTime<Utc>) -> Result<Vec<Job>, SqueueError> {
    let response: SqueueResponse = serde_json::from_slice(bytes)?;

    for error in &response.errors {
        tracing::warn!("squeue reported an error: {}", error);
    }

    let jobs = response
        .jobs
        .iter()
        .filter(|record| {
            let is_object = record.is_object();
            if !is_object {
                tracing::warn!("Skipping non-object squeue record: {}", record);
            }
            is_object
        })
        .map(|record| parse_job(record, now))
        .collect();

    Ok(jobs)
}

/// Build a job from one squeue record.
pub fn parse_job(record: &Value, now: DateTime<Utc>) -> Job {
    let time = record.get("time");

    let mut states = tolerant_string_list(record.get("job_state")).into_iter();
    let raw_state = states.next().unwrap_or_default();
    let state_flags: Vec<String> = states.collect();
    let state = JobState::parse(&raw_state);

    let (mut elapsed_seconds, elapsed_text) = parse_elapsed(time.and_then(|t| t.get("elapsed")));
    if elapsed_seconds.is_none() && state == JobState::Running {
        let start = time
            .and_then(|t| t.get("start"))
            .or_else(|| record.get("start_time"));
        elapsed_seconds = elapsed_since(start, now);
    }

    let limit_field = time
        .and_then(|t| t.get("limit"))
        .or_else(|| record.get("time_limit"));
    let (time_limit, limit_text) = parse_limit(limit_field);

    let resources = record.get("job_resources");
    let node_count = resources
        .and_then(|r| r.get("nodes"))
        .and_then(|n| n.get("count"))
        .or_else(|| record.get("node_count"));

    Job {
        id: tolerant_int(record.get("job_id"))
            .and_then(|id| u64::try_from(id).ok())
            .unwrap_or(0),
        name: tolerant_string(record.get("name")),
        partition: tolerant_string(record.get("partition")),
        state,
        raw_state,
        state_flags,
        elapsed_seconds,
        elapsed_text,
        time_limit,
        limit_text,
        requested_resources: parse_tres(&tolerant_string(record.get("tres_req_str"))),
        allocated_resources: parse_tres(&tolerant_string(record.get("tres_alloc_str"))),
        allocated_cpus: small_count(resources.and_then(|r| r.get("cpus"))),
        node_count: small_count(node_count),
    }
}

/// Elapsed is integer seconds or a duration string. A bare number in a
/// string counts as seconds too.
fn parse_elapsed(node: Option<&Value>) -> (Option<u64>, String) {
    let value = TolerantValue::decode(node);
    if value.infinite || (value.wrapped && !value.set) {
        // The payload of an unset wrapper is filler, not something to show
        return (None, String::new());
    }

    let seconds = match value.number {
        Some(n) => Some(n.max(0) as u64),
        None => parse_duration_secs(&value.text),
    };
    (seconds, value.text)
}

/// Numeric limits are minutes, including numeric strings like `"70"`, as
/// with `sbatch -t 70`. Other strings use the duration grammar.
fn parse_limit(node: Option<&Value>) -> (TimeLimit, String) {
    let value = TolerantValue::decode(node);

    if value.infinite || is_unlimited(&value.text) || value.number == Some(SLURM_INFINITE) {
        return (TimeLimit::Unlimited, value.text);
    }
    if (value.wrapped && !value.set) || value.number == Some(SLURM_NO_VAL) {
        return (TimeLimit::Unknown, String::new());
    }

    let limit = match value.number {
        Some(minutes) => Some((minutes.max(0) as u64).saturating_mul(60)),
        None => parse_duration_secs(&value.text),
    };
    let limit = limit.map(TimeLimit::Seconds).unwrap_or_default();
    (limit, value.text)
}

/// Seconds between an epoch timestamp and `now`, clamped at zero.
fn elapsed_since(start: Option<&Value>, now: DateTime<Utc>) -> Option<u64> {
    let start = tolerant_int(start).filter(|s| *s > 0)?;
    Some((now.timestamp() - start).max(0) as u64)
}

fn small_count(node: Option<&Value>) -> Option<u32> {
    tolerant_int(node)
        .filter(|n| *n != SLURM_NO_VAL && *n != SLURM_INFINITE)
        .and_then(|n| u32::try_from(n).ok())
}
