//! Time formatting helpers.

/// Format a duration in seconds to a human-readable string.
pub fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
    }
}

/// Relative age of an event, e.g. `"3h 12m ago"` or `"just now"`.
pub fn format_age(then_secs: u64, now_secs: u64) -> String {
    let elapsed = now_secs.saturating_sub(then_secs);
    if elapsed < 5 {
        "just now".to_string()
    } else {
        format!("{} ago", format_duration(elapsed))
    }
}
