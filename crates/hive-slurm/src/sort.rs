//! Display ordering for jobs.

use crate::types::Job;
use std::cmp::Ordering;

/// Running jobs first, then pending, then everything else; ties by job id.
pub fn compare_jobs(a: &Job, b: &Job) -> Ordering {
    a.state
        .sort_priority()
        .cmp(&b.state.sort_priority())
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort jobs in place for display. Stable.
pub fn sort_jobs(jobs: &mut [Job]) {
    jobs.sort_by(compare_jobs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobState;

    fn job(id: u64, state: JobState) -> Job {
        Job {
            id,
            state,
            ..Job::default()
        }
    }

    #[test]
    fn test_running_then_pending_then_id() {
        let mut jobs = vec![
            job(5, JobState::Pending),
            job(1, JobState::Running),
            job(2, JobState::Pending),
        ];
        sort_jobs(&mut jobs);
        let order: Vec<u64> = jobs.iter().map(|j| j.id).collect();
        assert_eq!(order, vec![1, 2, 5]);
        assert_eq!(jobs[0].state, JobState::Running);
    }

    #[test]
    fn test_other_states_share_priority() {
        let mut jobs = vec![
            job(30, JobState::Completed),
            job(10, JobState::Unknown("HOLD".to_string())),
            job(20, JobState::Failed),
            job(40, JobState::Pending),
        ];
        sort_jobs(&mut jobs);
        let order: Vec<u64> = jobs.iter().map(|j| j.id).collect();
        assert_eq!(order, vec![40, 10, 20, 30]);
    }

    #[test]
    fn test_stable_for_equal_keys() {
        let mut jobs = vec![job(3, JobState::Running), job(3, JobState::Running)];
        jobs[0].name = "first".to_string();
        jobs[1].name = "second".to_string();
        sort_jobs(&mut jobs);
        assert_eq!(jobs[0].name, "first");
    }
}
