//! Common capability implemented by every search strategy.
//!
//! The benchmark harness and the CLI drive strategies only through this
//! trait, so exact scans, probed IVF indexes and any pass-through to an
//! external engine are interchangeable.

use rayon::prelude::*;

use crate::vector::types::{SearchResult, VectorError};

/// A top-k nearest-neighbor search capability.
///
/// Implementations must not mutate shared state while searching; `Sync` is
/// required so batches can be answered in parallel.
pub trait SearchStrategy: Sync {
    /// Human-readable name used in benchmark reports.
    fn name(&self) -> String;

    /// Returns the `k` nearest stored vectors to `query`.
    fn search(&self, query: &[f64], k: usize) -> Result<SearchResult, VectorError>;

    /// Answers a batch of queries, results in the same order as `queries`.
    ///
    /// Fails with the first error encountered.
    fn search_batch(&self, queries: &[Vec<f64>], k: usize) -> Result<Vec<SearchResult>, VectorError> {
        queries
            .par_iter()
            .map(|query| self.search(query, k))
            .collect()
    }
}
