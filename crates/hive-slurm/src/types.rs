//! SLURM job types.

use hive_parsers::{ResourceMap, format_duration, lookup, lookup_gpu};
use serde::Serialize;

/// SLURM job status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum JobState {
    Running,
    Pending,
    Completing,
    Completed,
    Failed,
    Cancelled,
    Configuring,
    Suspended,
    /// Anything unrecognized, with the original text.
    Unknown(String),
}

impl JobState {
    /// Parse a state token, accepting both short (`R`, `PD`) and long
    /// (`RUNNING`, `PENDING`) codes.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        // States can carry suffixes like "CANCELLED by 12345"
        let token = trimmed.split_whitespace().next().unwrap_or(trimmed);

        match token.to_uppercase().as_str() {
            "RUNNING" | "R" => Self::Running,
            "PENDING" | "PD" => Self::Pending,
            "COMPLETING" | "CG" => Self::Completing,
            "COMPLETED" | "CD" => Self::Completed,
            "FAILED" | "F" | "NODE_FAIL" | "NF" | "BOOT_FAIL" | "BF" | "OUT_OF_MEMORY" | "OOM"
            | "TIMEOUT" | "TO" | "DEADLINE" | "DL" => Self::Failed,
            "CANCELLED" | "CA" => Self::Cancelled,
            "CONFIGURING" | "CF" => Self::Configuring,
            "SUSPENDED" | "S" | "STOPPED" | "ST" => Self::Suspended,
            _ => Self::Unknown(trimmed.to_string()),
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> String {
        match self {
            Self::Running => "Running".to_string(),
            Self::Pending => "Pending".to_string(),
            Self::Completing => "Completing".to_string(),
            Self::Completed => "Completed".to_string(),
            Self::Failed => "Failed".to_string(),
            Self::Cancelled => "Cancelled".to_string(),
            Self::Configuring => "Configuring".to_string(),
            Self::Suspended => "Suspended".to_string(),
            Self::Unknown(raw) => capitalize_words(raw),
        }
    }

    /// Display ordering: running first, then pending, then the rest.
    pub fn sort_priority(&self) -> u8 {
        match self {
            Self::Running => 0,
            Self::Pending => 1,
            _ => 2,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Running => "●",
            Self::Pending => "◐",
            Self::Completing | Self::Configuring => "◑",
            Self::Completed => "✓",
            Self::Failed => "✗",
            Self::Cancelled => "⊘",
            Self::Suspended => "‖",
            Self::Unknown(_) => "?",
        }
    }
}

fn capitalize_words(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Job time limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TimeLimit {
    /// Not reported or unreadable
    #[default]
    Unknown,
    /// Explicitly infinite
    Unlimited,
    /// Finite limit in seconds
    Seconds(u64),
}

impl TimeLimit {
    pub fn seconds(&self) -> Option<u64> {
        match self {
            Self::Seconds(s) => Some(*s),
            _ => None,
        }
    }
}

/// SLURM job information from `squeue --json`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Job {
    /// SLURM job ID
    pub id: u64,

    /// Job name
    pub name: String,

    /// Partition
    pub partition: String,

    /// Primary state
    pub state: JobState,

    /// Primary state token as reported
    pub raw_state: String,

    /// Additional state flags (e.g. NODE_FAIL)
    pub state_flags: Vec<String>,

    /// Seconds the job has been running
    pub elapsed_seconds: Option<u64>,

    /// Elapsed field as reported, for display when it could not be parsed
    pub elapsed_text: String,

    /// Time limit
    pub time_limit: TimeLimit,

    /// Limit field as reported
    pub limit_text: String,

    /// Requested resources (TRES), lowercased keys
    pub requested_resources: ResourceMap,

    /// Allocated resources (TRES), lowercased keys
    pub allocated_resources: ResourceMap,

    /// CPU count from the structured allocation
    pub allocated_cpus: Option<u32>,

    /// Node count from the structured allocation
    pub node_count: Option<u32>,
}

impl Default for JobState {
    fn default() -> Self {
        Self::Unknown(String::new())
    }
}

impl Job {
    /// Seconds left before the limit, `None` when unlimited or unknown.
    pub fn time_remaining_seconds(&self) -> Option<u64> {
        let limit = self.time_limit.seconds()?;
        Some(limit.saturating_sub(self.elapsed_seconds.unwrap_or(0)))
    }

    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            format!("Job {}", self.id)
        } else {
            self.name.clone()
        }
    }

    pub fn formatted_elapsed_time(&self) -> String {
        match self.elapsed_seconds {
            Some(secs) => format_duration(secs),
            None if !self.elapsed_text.is_empty() => self.elapsed_text.clone(),
            None => "—".to_string(),
        }
    }

    pub fn formatted_time_remaining(&self) -> String {
        match self.time_limit {
            TimeLimit::Unlimited => "∞".to_string(),
            _ => self
                .time_remaining_seconds()
                .map(format_duration)
                .unwrap_or_else(|| "—".to_string()),
        }
    }

    pub fn formatted_time_limit(&self) -> String {
        match self.time_limit {
            TimeLimit::Unlimited => "∞".to_string(),
            TimeLimit::Seconds(secs) => format_duration(secs),
            TimeLimit::Unknown if !self.limit_text.is_empty() => self.limit_text.clone(),
            TimeLimit::Unknown => "—".to_string(),
        }
    }

    /// CPU count: requested, then allocated, then the structured allocation.
    pub fn cpu_summary(&self) -> Option<String> {
        lookup(&self.requested_resources, "cpu")
            .or_else(|| lookup(&self.allocated_resources, "cpu"))
            .map(str::to_string)
            .or_else(|| self.allocated_cpus.map(|c| c.to_string()))
    }

    pub fn memory_summary(&self) -> Option<String> {
        lookup(&self.requested_resources, "mem")
            .or_else(|| lookup(&self.allocated_resources, "mem"))
            .map(str::to_string)
    }

    pub fn gpu_summary(&self) -> Option<String> {
        lookup_gpu(&self.requested_resources)
            .or_else(|| lookup_gpu(&self.allocated_resources))
            .map(str::to_string)
    }

    /// One-line resource summary, e.g. "4 CPU · 16G · 1 GPU".
    pub fn resource_summary(&self) -> Option<String> {
        let parts: Vec<String> = [
            self.cpu_summary().map(|c| format!("{} CPU", c)),
            self.memory_summary(),
            self.gpu_summary().map(|g| format!("{} GPU", g)),
        ]
        .into_iter()
        .flatten()
        .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" · "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_parsers::parse_tres;

    #[test]
    fn test_parse_state() {
        assert_eq!(JobState::parse("RUNNING"), JobState::Running);
        assert_eq!(JobState::parse(" r "), JobState::Running);
        assert_eq!(JobState::parse("PD"), JobState::Pending);
        assert_eq!(JobState::parse("completing"), JobState::Completing);
        assert_eq!(JobState::parse("CD"), JobState::Completed);
        assert_eq!(JobState::parse("TIMEOUT"), JobState::Failed);
        assert_eq!(JobState::parse("CANCELLED by 12345"), JobState::Cancelled);
        assert_eq!(JobState::parse("CF"), JobState::Configuring);
        assert_eq!(JobState::parse("SUSPENDED"), JobState::Suspended);
        assert_eq!(
            JobState::parse("REQUEUE_HOLD"),
            JobState::Unknown("REQUEUE_HOLD".to_string())
        );
        assert_eq!(JobState::parse(""), JobState::Unknown(String::new()));
    }

    #[test]
    fn test_unknown_label() {
        assert_eq!(JobState::parse("requeue_hold").label(), "Requeue_hold");
        assert_eq!(JobState::parse("special state").label(), "Special State");
        assert_eq!(JobState::Running.label(), "Running");
    }

    #[test]
    fn test_time_remaining() {
        let job = Job {
            elapsed_seconds: Some(61),
            time_limit: TimeLimit::Seconds(70 * 60),
            ..Job::default()
        };
        assert_eq!(job.time_remaining_seconds(), Some(4139));
        assert_eq!(job.formatted_time_remaining(), "1h 08m");
        assert_eq!(job.formatted_elapsed_time(), "1m 01s");

        let overrun = Job {
            elapsed_seconds: Some(500),
            time_limit: TimeLimit::Seconds(60),
            ..Job::default()
        };
        assert_eq!(overrun.time_remaining_seconds(), Some(0));
    }

    #[test]
    fn test_display_fallbacks() {
        let job = Job {
            id: 9,
            time_limit: TimeLimit::Unlimited,
            ..Job::default()
        };
        assert_eq!(job.display_name(), "Job 9");
        assert_eq!(job.time_remaining_seconds(), None);
        assert_eq!(job.formatted_time_remaining(), "∞");
        assert_eq!(job.formatted_elapsed_time(), "—");

        let job = Job {
            elapsed_text: "INVALID".to_string(),
            limit_text: "soon".to_string(),
            ..Job::default()
        };
        assert_eq!(job.formatted_elapsed_time(), "INVALID");
        assert_eq!(job.formatted_time_limit(), "soon");
        assert_eq!(job.formatted_time_remaining(), "—");
    }

    #[test]
    fn test_resource_summary() {
        let job = Job {
            requested_resources: parse_tres("CPU=4,mem=16G,gres/gpu:a100=2"),
            ..Job::default()
        };
        assert_eq!(job.resource_summary().as_deref(), Some("4 CPU · 16G · 2 GPU"));

        let job = Job {
            requested_resources: parse_tres("mem=4G"),
            allocated_cpus: Some(8),
            ..Job::default()
        };
        assert_eq!(job.cpu_summary().as_deref(), Some("8"));
        assert_eq!(job.gpu_summary(), None);

        assert_eq!(Job::default().resource_summary(), None);
    }
}
