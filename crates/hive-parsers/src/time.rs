//! Duration parsing and formatting for Slurm time fields.

use once_cell::sync::Lazy;
use regex::Regex;

/// `[D-]HH:MM:SS`, `[D-]HH:MM` or `MM:SS`.
static DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:(\d+)-)?(\d+):(\d{1,2})(?::(\d{1,2}))?$").unwrap());

/// Whether a field holds one of Slurm's "no value" placeholders.
pub fn is_placeholder(s: &str) -> bool {
    let s = s.trim();
    s == "-"
        || s.eq_ignore_ascii_case("N/A")
        || s.eq_ignore_ascii_case("NONE")
        || s.eq_ignore_ascii_case("UNKNOWN")
}

/// Whether a time limit string means "no limit".
pub fn is_unlimited(s: &str) -> bool {
    let s = s.trim();
    s.eq_ignore_ascii_case("UNLIMITED") || s.eq_ignore_ascii_case("INFINITE")
}

/// Parse a Slurm duration to seconds.
///
/// Supports:
/// - D-HH:MM:SS (time limit with days)
/// - D-HH:MM
/// - HH:MM:SS
/// - MM:SS
/// - Seconds as integer
///
/// Fractional seconds (`01:30:00.123`) are dropped. Returns None for
/// "UNLIMITED", placeholders, empty or malformed strings.
pub fn parse_duration_secs(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() || is_unlimited(s) || is_placeholder(s) {
        return None;
    }

    let s = s.split('.').next().unwrap_or(s);
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse().ok();
    }

    let caps = DURATION_RE.captures(s)?;
    let num = |i: usize| -> Option<u64> { caps.get(i).and_then(|m| m.as_str().parse().ok()) };

    let days = num(1);
    let first = num(2)?;
    let second = num(3)?;

    // Out-of-range values are unreadable, not wrapped
    let hms = |h: u64, m: u64, s: u64| {
        h.checked_mul(3600)?
            .checked_add(m.checked_mul(60)?)?
            .checked_add(s)
    };
    let seconds = match (days, num(4)) {
        (_, Some(third)) => hms(first, second, third)?,
        // With a day prefix the two-part form is HH:MM
        (Some(_), None) => hms(first, second, 0)?,
        (None, None) => hms(0, first, second)?,
    };

    days.unwrap_or(0).checked_mul(86_400)?.checked_add(seconds)
}

/// Format seconds for compact display (e.g., "2d 03h", "1h 08m", "1m 01s", "42s").
pub fn format_duration(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if seconds >= 86_400 {
        format!("{}d {:02}h", days, hours)
    } else if seconds >= 3600 {
        format!("{}h {:02}m", hours, mins)
    } else if seconds >= 60 {
        format!("{}m {:02}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}
