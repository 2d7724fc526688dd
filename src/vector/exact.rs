//! Exhaustive linear-scan search, the ground truth for every other strategy.

use rayon::prelude::*;

use crate::vector::distance::DistanceMetric;
use crate::vector::store::{VectorRecord, VectorStore};
use crate::vector::strategy::SearchStrategy;
use crate::vector::topk::TopK;
use crate::vector::types::{SearchResult, VectorError, VectorId, validate_k};

/// Stores smaller than this are scanned on the calling thread.
pub(crate) const PARALLEL_SCAN_THRESHOLD: usize = 4096;

/// Records per rayon task when scanning in parallel.
const SCAN_CHUNK: usize = 1024;

/// Ground-truth nearest-neighbor search by exhaustive comparison.
#[derive(Debug, Clone, Copy)]
pub struct ExactSearcher<'a> {
    store: &'a VectorStore,
    metric: DistanceMetric,
}

impl<'a> ExactSearcher<'a> {
    #[must_use]
    pub fn new(store: &'a VectorStore, metric: DistanceMetric) -> Self {
        Self { store, metric }
    }

    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Returns the `k` nearest records to `query`.
    ///
    /// An empty store yields an empty result and `k` larger than the store
    /// returns every record ranked.
    ///
    /// # Errors
    /// - `InvalidParameter` if `k == 0`
    /// - `DimensionMismatch` if the query length differs from the store
    /// - `ZeroVector` under the cosine metric when a zero vector is involved
    pub fn search(&self, query: &[f64], k: usize) -> Result<SearchResult, VectorError> {
        validate_k(k)?;
        self.store.validate_query(query)?;
        if self.store.is_empty() {
            return Ok(SearchResult::empty());
        }

        let records = self.store.records();
        let top = if records.len() < PARALLEL_SCAN_THRESHOLD {
            rank_records(records, query, k, self.metric)?
        } else {
            records
                .par_chunks(SCAN_CHUNK)
                .map(|chunk| rank_records(chunk, query, k, self.metric))
                .try_reduce(|| TopK::new(k), |a, b| Ok(a.merge(b)))?
        };
        Ok(top.into_result())
    }
}

impl SearchStrategy for ExactSearcher<'_> {
    fn name(&self) -> String {
        format!("exact ({})", self.metric)
    }

    fn search(&self, query: &[f64], k: usize) -> Result<SearchResult, VectorError> {
        ExactSearcher::search(self, query, k)
    }
}

fn rank_records(
    records: &[VectorRecord],
    query: &[f64],
    k: usize,
    metric: DistanceMetric,
) -> Result<TopK, VectorError> {
    rank_candidates(
        records.iter().map(|r| (&r.id, r.vector.as_slice())),
        query,
        k,
        metric,
    )
}

/// Computes the distance from `query` to each candidate and keeps the best `k`.
pub(crate) fn rank_candidates<'v>(
    candidates: impl Iterator<Item = (&'v VectorId, &'v [f64])>,
    query: &[f64],
    k: usize,
    metric: DistanceMetric,
) -> Result<TopK, VectorError> {
    let mut top = TopK::new(k);
    for (id, vector) in candidates {
        top.offer(id, metric.distance(query, vector)?);
    }
    Ok(top)
}
