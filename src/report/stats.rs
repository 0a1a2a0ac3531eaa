// Summary statistics
// Min/max/mean/median and interpolated percentile over duration lists

use serde::{Deserialize, Serialize};

/// Summary of a list of values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,

    /// Value below which `percentile` of the values fall
    pub below: f64,
}

impl DurationSummary {
    /// Summarize values; `None` when there is nothing to summarize
    pub fn from_values(values: &[f64], percentile: f64) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let median = if count % 2 == 1 {
            sorted[count / 2]
        } else {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        };

        Some(DurationSummary {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean,
            median,
            below: percentile_below(&sorted, percentile),
        })
    }

    pub fn from_millis(values: &[i64], percentile: f64) -> Option<Self> {
        let values: Vec<f64> = values.iter().map(|&v| v as f64).collect();
        Self::from_values(&values, percentile)
    }
}

/// Linearly interpolated value at `fraction` of an ascending list
///
/// Position `len * fraction` is split into an index and a remainder, and the
/// value is blended with its successor (clamped to the last element).
pub fn percentile_below(sorted: &[f64], fraction: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let last = sorted.len() - 1;
    let position = sorted.len() as f64 * fraction.clamp(0.0, 1.0);
    let base = (position.trunc() as usize).min(last);
    let remainder = position - position.trunc();
    let next = (base + 1).min(last);

    sorted[base] * (1.0 - remainder) + sorted[next] * remainder
}
