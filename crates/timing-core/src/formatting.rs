use crate::models::Seconds;
use crate::time_literal::NOT_AVAILABLE;

/// Label shown in the gap column for the fastest driver.
pub const LEADER: &str = "Leader";

/// Render the gap of a ranked row to the leader.
///
/// Position 1 always reads `"Leader"`; everyone else gets a signed
/// millisecond gap.
///
/// # Examples
///
/// ```
/// use timing_core::formatting::format_gap;
///
/// assert_eq!(format_gap(0.0, 1), "Leader");
/// assert_eq!(format_gap(0.3, 2), "+0.300s");
/// assert_eq!(format_gap(0.0, 2), "+0.000s");
/// ```
pub fn format_gap(gap: Seconds, position: usize) -> String {
    if position == 1 {
        LEADER.to_string()
    } else {
        format!("+{:.3}s", gap)
    }
}

/// Render a signed delta in seconds, e.g. `"+0.125s"` or `"-0.200s"`.
///
/// # Examples
///
/// ```
/// use timing_core::formatting::format_delta;
///
/// assert_eq!(format_delta(Some(0.125)), "+0.125s");
/// assert_eq!(format_delta(Some(-0.2)),  "-0.200s");
/// assert_eq!(format_delta(None),        "N/A");
/// ```
pub fn format_delta(delta: Option<Seconds>) -> String {
    match delta {
        Some(d) => format!("{:+.3}s", normalise_zero(d)),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Render a speed with one decimal, e.g. `"245.7 km/h"`.
pub fn format_speed(speed: Option<f64>) -> String {
    match speed {
        Some(v) => format!("{:.1} km/h", v),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Render a signed percentage with two decimals, e.g. `"-0.45%"`.
pub fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:+.2}%", normalise_zero(v)),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Calculate `(part / whole) * 100`, rounded to `decimal_places`.
///
/// Returns `0.0` if `whole` is zero.
///
/// # Examples
///
/// ```
/// use timing_core::formatting::percentage;
///
/// assert!((percentage(0.5, 90.0, 3) - 0.556).abs() < 1e-9);
/// assert_eq!(percentage(1.0, 0.0, 2), 0.0);
/// ```
pub fn percentage(part: f64, whole: f64, decimal_places: u32) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    let raw = (part / whole) * 100.0;
    let factor = 10_f64.powi(decimal_places as i32);
    (raw * factor).round() / factor
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Collapse `-0.0` (and values that round to it) so they print as `+0.000`.
fn normalise_zero(value: f64) -> f64 {
    if (value * 1000.0).round() == 0.0 {
        0.0
    } else {
        value
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
