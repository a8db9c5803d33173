use chrono::Utc;

pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Renders a duration in seconds as `HH:MM:SS`, for the `timer` command's
/// elapsed-time report.
pub fn format_hms(total_secs: i64) -> String {
    let total_secs = total_secs.max(0);
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

/// Strips every leading `@` from a user-supplied name, as ban/unban/mod
/// targets are written `@name` in chat but stored bare.
pub fn strip_at_symbols(s: &str) -> &str {
    s.trim_start_matches('@')
}
