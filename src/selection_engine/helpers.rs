//! Small numeric and ordering helpers shared across the pipeline stages.
//!
//! Scoring terms use [`neutral_or`] so that a term which cannot be computed
//! (empty input, NaN from a bad profile field) degrades to `0.5` instead of
//! poisoning the candidate's whole score.

/// Neutral value substituted for any term that cannot be computed.
pub const NEUTRAL: f64 = 0.5;

/// Comparison slack for score ties.
pub const SCORE_EPSILON: f64 = 1e-9;

pub fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        NEUTRAL
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// `value` if it is finite, otherwise [`NEUTRAL`].
pub fn neutral_or(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => NEUTRAL,
    }
}

/// Arithmetic mean; `None` for an empty input.
pub fn mean<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values {
        sum += v;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// `items` rotated left by `position` (round-robin starting point).
pub fn rotated<T: Clone>(items: &[T], position: usize) -> Vec<T> {
    if items.is_empty() {
        return Vec::new();
    }
    let start = position % items.len();
    items[start..].iter().chain(items[..start].iter()).cloned().collect()
}
