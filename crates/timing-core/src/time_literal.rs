//! Lap and sector time literals as they appear in timing exports.
//!
//! Exports mix `M:SS.mmm`, bare seconds and locale decimals (`28,200`), and
//! mark laps without a time with a text sentinel such as `No Time`. Parsing
//! never fails loudly: anything that cannot be turned into seconds is `None`.

use crate::models::Seconds;

/// Sentinel matched (case-insensitively, as a substring) when no other is configured.
pub const DEFAULT_NO_TIME_SENTINEL: &str = "no time";

/// Marker rendered for an absent time.
pub const NOT_AVAILABLE: &str = "N/A";

/// Parse a time literal using the default `no time` sentinel.
///
/// ```
/// use timing_core::time_literal::parse;
///
/// assert_eq!(parse(""), None);
/// assert_eq!(parse("No Time"), None);
/// assert_eq!(parse("1:30.500"), Some(90.5));
/// assert_eq!(parse("28,200"), Some(28.2));
/// assert_eq!(parse("28.200s"), Some(28.2));
/// ```
pub fn parse(literal: &str) -> Option<Seconds> {
    parse_with_sentinel(literal, DEFAULT_NO_TIME_SENTINEL)
}

/// Parse a time literal, treating any literal containing `sentinel`
/// (case-insensitive) as "no time recorded".
pub fn parse_with_sentinel(literal: &str, sentinel: &str) -> Option<Seconds> {
    let trimmed = literal.trim();
    if trimmed.is_empty() {
        return None;
    }

    let sentinel = sentinel.trim().to_lowercase();
    if !sentinel.is_empty() && trimmed.to_lowercase().contains(&sentinel) {
        return None;
    }

    let normalised = trimmed.replace(',', ".");
    // Accept the seconds-only display form, e.g. "28.200s".
    let normalised = normalised
        .strip_suffix(['s', 'S'])
        .map(str::trim_end)
        .unwrap_or(&normalised);

    match normalised.split_once(':') {
        Some((minutes, seconds)) => {
            let minutes: i64 = minutes.trim().parse().ok()?;
            let seconds: f64 = seconds.trim().parse().ok()?;
            if !seconds.is_finite() {
                return None;
            }
            Some(minutes as f64 * 60.0 + seconds)
        }
        None => normalised.parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}

/// Parse a plain numeric cell (speeds, signal values), accepting a locale comma.
pub fn parse_decimal(literal: &str) -> Option<f64> {
    let trimmed = literal.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Render a time for display with millisecond precision.
///
/// * `None`        → `"N/A"`
/// * under a minute → `"28.200s"`
/// * otherwise      → `"1:30.500"`
///
/// ```
/// use timing_core::time_literal::format;
///
/// assert_eq!(format(None), "N/A");
/// assert_eq!(format(Some(28.2)), "28.200s");
/// assert_eq!(format(Some(90.5)), "1:30.500");
/// assert_eq!(format(Some(59.9999)), "1:00.000");
/// ```
pub fn format(seconds: Option<Seconds>) -> String {
    let Some(value) = seconds else {
        return NOT_AVAILABLE.to_string();
    };

    // Round once to whole milliseconds so 59.9999 renders as 1:00.000, never 0:60.000.
    let negative = value < 0.0;
    let total_ms = (value.abs() * 1000.0).round() as u64;
    let minutes = total_ms / 60_000;
    let rem_ms = total_ms % 60_000;
    let sign = if negative && total_ms > 0 { "-" } else { "" };

    if minutes > 0 {
        format!("{}{}:{:02}.{:03}", sign, minutes, rem_ms / 1000, rem_ms % 1000)
    } else {
        format!("{}{}.{:03}s", sign, rem_ms / 1000, rem_ms % 1000)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
