//! Elementwise vector helpers and the self-join estimator.

use crate::sketch::AgmsSketch;

/// Elementwise product of two equal-length vectors.
///
/// # Panics
///
/// Panics if the lengths differ.
#[must_use]
pub fn multiply(a: &[f64], b: &[f64]) -> Vec<f64> {
    assert_eq!(a.len(), b.len(), "multiply: length mismatch");
    a.iter().zip(b).map(|(x, y)| x * y).collect()
}

/// Elementwise sum of two equal-length vectors.
///
/// # Panics
///
/// Panics if the lengths differ.
#[must_use]
pub fn sum(a: &[f64], b: &[f64]) -> Vec<f64> {
    assert_eq!(a.len(), b.len(), "sum: length mismatch");
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}

/// Median of a non-empty slice; the mean of the two middle values for even lengths.
///
/// # Panics
///
/// Panics on an empty slice.
#[must_use]
pub fn median_of(values: &[f64]) -> f64 {
    assert!(!values.is_empty(), "median of an empty slice");
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

/// Self-join size estimate: median over rows of the row sum of squares.
#[must_use]
pub fn median(sketch: &AgmsSketch) -> f64 {
    let rows: Vec<f64> = (0..sketch.depth())
        .map(|d| sketch.row_sum_of_squares(d))
        .collect();
    median_of(&rows)
}
