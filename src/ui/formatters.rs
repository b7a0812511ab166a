use chrono::{DateTime, Local, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;

const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

static SIZE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)\s*([0-9]+(?:\.[0-9]+)?)\s*([kmgtp]?)(i?)b?\s*$")
        .expect("size pattern is a valid regex")
});

/// Format a byte counter the way the dashboard shows it (B, KB, MB, GB, TB, PB)
pub fn format_bytes(size: u64) -> String {
    if size < 1024 {
        return format!("{} B", size);
    }

    let mut value = size as f64;
    for unit in UNITS {
        value /= 1024.0;
        if value < 1024.0 {
            return format!("{:.2} {}", value, unit);
        }
    }

    format!("{:.2} PB", value / 1024.0)
}

/// Parse a byte count that may be human-formatted (`"12.3 KB"`, `"1.2MiB"`).
///
/// Anything unrecognised counts as zero.
pub fn parse_size(text: &str) -> u64 {
    let trimmed = text.trim();
    if let Ok(n) = trimmed.parse::<u64>() {
        return n;
    }

    let Some(caps) = SIZE_PATTERN.captures(trimmed) else {
        return 0;
    };

    let value: f64 = caps[1].parse().unwrap_or(0.0);
    let exponent = match caps[2].to_ascii_uppercase().as_str() {
        "K" => 1,
        "M" => 2,
        "G" => 3,
        "T" => 4,
        "P" => 5,
        _ => 0,
    };

    (value * 1024f64.powi(exponent)) as u64
}

/// Format a unix timestamp as local time (YYYY-MM-DD HH:MM:SS)
pub fn format_timestamp(epoch: i64) -> String {
    match Local.timestamp_opt(epoch, 0).single() {
        Some(datetime) => format_datetime(datetime),
        None => epoch.to_string(),
    }
}

pub fn format_datetime(datetime: DateTime<Local>) -> String {
    datetime.format("%Y-%m-%d %H:%M:%S").to_string()
}
