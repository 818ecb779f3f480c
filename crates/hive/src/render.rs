//! Plain-text and JSON rendering of polling snapshots.

use chrono::Local;
use hive_poller::PollingSnapshot;
use hive_slurm::Job;

const NAME_WIDTH: usize = 24;

/// Render a snapshot, ending with a newline.
pub fn render(
    snapshot: &PollingSnapshot,
    max_visible_jobs: usize,
    json: bool,
) -> Result<String, serde_json::Error> {
    if json {
        Ok(format!("{}\n", serde_json::to_string(snapshot)?))
    } else {
        Ok(render_text(snapshot, max_visible_jobs))
    }
}

fn render_text(snapshot: &PollingSnapshot, max_visible_jobs: usize) -> String {
    let state = &snapshot.state;
    let updated = state
        .last_fetch_time
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());

    let mut lines = vec![format!(
        "{}  [{}, updated {}]",
        state.menu_title(),
        snapshot.host,
        updated
    )];

    if let Some(error) = &state.last_error {
        lines.push(format!("  error: {}", error));
    }

    let visible = state.visible_jobs(max_visible_jobs);
    if visible.is_empty() && state.last_error.is_none() {
        lines.push("  No jobs".to_string());
    }
    lines.extend(visible.iter().map(job_line));

    let hidden = state.jobs.len() - visible.len();
    if hidden > 0 {
        lines.push(format!("  … and {} more", hidden));
    }

    lines.push(String::new());
    lines.join("\n")
}

fn job_line(job: &Job) -> String {
    let mut line = format!(
        "{} {:>8}  {:<width$}  {:<11} {:>8} elapsed  {:>8} left",
        job.state.symbol(),
        job.id,
        truncate(&job.display_name(), NAME_WIDTH),
        job.state.label(),
        job.formatted_elapsed_time(),
        job.formatted_time_remaining(),
        width = NAME_WIDTH,
    );
    if !job.partition.is_empty() {
        line.push_str(&format!("  [{}]", job.partition));
    }
    if let Some(resources) = job.resource_summary() {
        line.push_str("  ");
        line.push_str(&resources);
    }
    line
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}
