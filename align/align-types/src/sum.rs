//! Deterministic reductions.
//!
//! Parallel phases collect their per-item results into index-ordered
//! buffers and reduce them with pairwise summation. The reduction order is
//! a pure function of the input length, so repeated runs produce
//! bit-identical aggregates regardless of thread scheduling.

/// Sum `values` by pairwise (cascade) summation.
#[must_use]
pub fn pairwise_sum(values: &[f64]) -> f64 {
    const BASE: usize = 16;
    if values.len() <= BASE {
        return values.iter().sum();
    }
    let mid = values.len() / 2;
    pairwise_sum(&values[..mid]) + pairwise_sum(&values[mid..])
}

/// Mean of `values` via [`pairwise_sum`]; 0 for an empty slice.
#[must_use]
pub fn pairwise_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    pairwise_sum(values) / n
}
