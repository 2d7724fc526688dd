//! Aggregate statistics and retrieval quality metrics.

use std::collections::HashSet;

use serde::Serialize;

use crate::vector::SearchResult;

/// Mean, population variance and range of a sample set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub mean: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
}

impl Summary {
    /// Summarizes `samples`, or `None` for an empty slice.
    ///
    /// Variance is the population variance, so a single sample has zero
    /// variance.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        let (min, max) = samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| {
                (lo.min(s), hi.max(s))
            });
        Some(Self {
            mean,
            variance,
            min,
            max,
        })
    }

    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }
}

/// Fraction of the true neighbors in `truth` that `approx` also returned.
///
/// An empty ground truth has nothing to miss and scores 1.0.
pub fn recall_at_k(truth: &SearchResult, approx: &SearchResult) -> f64 {
    if truth.is_empty() {
        return 1.0;
    }
    let expected: HashSet<_> = truth.ids().collect();
    let found = approx.ids().filter(|id| expected.contains(id)).count();
    found as f64 / expected.len() as f64
}

/// Mean recall across paired per-query results.
pub fn mean_recall(truths: &[SearchResult], approximations: &[SearchResult]) -> f64 {
    if truths.is_empty() {
        return 1.0;
    }
    let total: f64 = truths
        .iter()
        .zip(approximations)
        .map(|(truth, approx)| recall_at_k(truth, approx))
        .sum();
    total / truths.len() as f64
}
