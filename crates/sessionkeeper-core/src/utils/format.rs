use chrono::{DateTime, Local, Utc};

/// Format remaining milliseconds as a `m:ss` countdown.
/// Negative values render as `0:00`.
pub fn format_countdown(remaining_ms: i64) -> String {
    let total_secs = remaining_ms.max(0) / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

/// Whole minutes left, rounded up, for the expiry warning text
pub fn format_minutes_left(remaining_ms: i64) -> String {
    let minutes = (remaining_ms.max(0) + 59_999) / 60_000;
    if minutes == 1 {
        "1 minute".to_string()
    } else {
        format!("{} minutes", minutes)
    }
}

/// Format an instant in local time for display
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%b %d, %Y %H:%M:%S").to_string()
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Shorten a bearer token for logs and status output.
pub fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(8).collect();
    if token.chars().count() <= 8 {
        "*".repeat(visible.len())
    } else {
        format!("{}…", visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(0), "0:00");
        assert_eq!(format_countdown(-5000), "0:00");
        assert_eq!(format_countdown(9_999), "0:09");
        assert_eq!(format_countdown(61_000), "1:01");
        assert_eq!(format_countdown(30 * 60_000), "30:00");
    }

    #[test]
    fn test_format_minutes_left() {
        assert_eq!(format_minutes_left(1), "1 minute");
        assert_eq!(format_minutes_left(60_000), "1 minute");
        assert_eq!(format_minutes_left(60_001), "2 minutes");
        assert_eq!(format_minutes_left(6 * 60_000), "6 minutes");
        assert_eq!(format_minutes_left(0), "0 minutes");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("eyJhbGciOiJIUzI1NiJ9.payload.sig"), "eyJhbGci…");
        assert_eq!(mask_token("short"), "*****");
    }
}
