//! Small descriptive-statistics helpers over lap and sector times.
//!
//! Every helper takes the *present* values only; callers filter out absent
//! times before calling, so a missing lap never drags a mean towards zero.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::models::Seconds;

// ── Percentile helper ─────────────────────────────────────────────────────────

/// Compute the `p`-th percentile of a **sorted** slice using linear
/// interpolation between closest ranks.
///
/// Returns `None` for an empty slice.
pub fn percentile(sorted_data: &[f64], p: f64) -> Option<f64> {
    let len = sorted_data.len();
    match len {
        0 => None,
        1 => Some(sorted_data[0]),
        _ => {
            let rank = (p / 100.0) * (len as f64 - 1.0);
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            if lo == hi {
                return Some(sorted_data[lo]);
            }
            let frac = rank - lo as f64;
            Some(sorted_data[lo] + frac * (sorted_data[hi] - sorted_data[lo]))
        }
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    percentile(&sorted(values), 50.0)
}

/// Sample standard deviation (n − 1 denominator). `None` below two values.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0);
    Some(var.sqrt())
}

pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().min_by(total_cmp)
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().max_by(total_cmp)
}

/// Total order on floats for sorting; NaN never reaches here (the codec rejects it).
pub fn total_cmp(a: &f64, b: &f64) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(total_cmp);
    v
}

// ── TimeStats ─────────────────────────────────────────────────────────────────

/// Summary of a set of present times.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeStats {
    pub count: usize,
    pub best: Option<Seconds>,
    pub worst: Option<Seconds>,
    pub mean: Option<Seconds>,
    pub median: Option<Seconds>,
    pub std_dev: Option<Seconds>,
}

impl TimeStats {
    /// Summarise the present values of `times`, ignoring `None`.
    pub fn from_optional<I>(times: I) -> Self
    where
        I: IntoIterator<Item = Option<Seconds>>,
    {
        let values: Vec<f64> = times.into_iter().flatten().collect();
        Self::from_values(&values)
    }

    pub fn from_values(values: &[f64]) -> Self {
        Self {
            count: values.len(),
            best: min(values),
            worst: max(values),
            mean: mean(values),
            median: median(values),
            std_dev: std_dev(values),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
