//! Display helpers shared by the CLI and notification texts.

/// Seconds as `MM:SS`. Minutes are not wrapped into hours.
pub fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Minutes as `25 min`, `1h 15min` or `2h`.
pub fn format_duration_min(minutes: u64) -> String {
    if minutes < 60 {
        return format!("{minutes} min");
    }
    let hours = minutes / 60;
    let rest = minutes % 60;
    if rest > 0 {
        format!("{hours}h {rest}min")
    } else {
        format!("{hours}h")
    }
}

/// Fraction of `total` already consumed, clamped to 0.0 ..= 1.0.
pub fn progress(total_secs: u64, remaining_secs: u64) -> f64 {
    if total_secs == 0 {
        return 0.0;
    }
    let elapsed = total_secs.saturating_sub(remaining_secs);
    (elapsed as f64 / total_secs as f64).clamp(0.0, 1.0)
}
