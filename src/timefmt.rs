use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};

/// Format an instant as a UTC string for logs and CLI output.
pub fn format_instant(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Parse an RFC 3339 instant, or a bare `YYYY-MM-DD` as midnight UTC.
pub fn parse_instant(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| anyhow!("Invalid instant '{}': expected RFC 3339 or YYYY-MM-DD", input))
}
