//! Vector search engine that orchestrates the store, exact search and the
//! published IVF index.
//!
//! The engine is the explicit handle callers pass around instead of global
//! state. Mutations go through it so a published index can be recognised as
//! stale; rebuilding is always explicit.

use std::sync::Arc;

use crate::vector::clustering::KMeansConfig;
use crate::vector::distance::DistanceMetric;
use crate::vector::exact::ExactSearcher;
use crate::vector::ivf::IvfIndex;
use crate::vector::shared::SharedIndex;
use crate::vector::store::{VectorRecord, VectorStore};
use crate::vector::strategy::SearchStrategy;
use crate::vector::types::{IndexState, SearchResult, VectorError, VectorId};

/// Whether approximate queries can currently be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    NotBuilt,
    Ready { num_clusters: usize },
    Stale { built_at: u64, current: u64 },
}

/// Main vector search engine.
///
/// This engine manages:
/// - The in-memory vector store
/// - K-means clustering for IVF indexing
/// - Exact and approximate nearest neighbor search
#[derive(Debug)]
pub struct VectorSearchEngine {
    store: VectorStore,
    metric: DistanceMetric,
    config: KMeansConfig,
    index: SharedIndex,
}

impl VectorSearchEngine {
    #[must_use]
    pub fn new(metric: DistanceMetric, config: KMeansConfig) -> Self {
        Self::with_store(VectorStore::new(), metric, config)
    }

    /// Wraps an already loaded store.
    #[must_use]
    pub fn with_store(store: VectorStore, metric: DistanceMetric, config: KMeansConfig) -> Self {
        Self {
            store,
            metric,
            config,
            index: SharedIndex::new(),
        }
    }

    pub fn insert(&mut self, id: impl Into<VectorId>, vector: Vec<f64>) -> Result<(), VectorError> {
        self.store.insert(id, vector)?;
        self.note_mutation();
        Ok(())
    }

    pub fn bulk_insert(
        &mut self,
        records: impl IntoIterator<Item = VectorRecord>,
    ) -> Result<usize, VectorError> {
        let inserted = self.store.bulk_insert(records)?;
        if inserted > 0 {
            self.note_mutation();
        }
        Ok(inserted)
    }

    pub fn remove(&mut self, id: &VectorId) -> Option<VectorRecord> {
        let removed = self.store.remove(id)?;
        self.note_mutation();
        Some(removed)
    }

    /// Builds a fresh index from the current store and publishes it.
    ///
    /// Queries keep using the previous index until the new one is ready.
    pub fn build_index(&self, num_clusters: usize) -> Result<(), VectorError> {
        let index = IvfIndex::build(&self.store, self.metric, num_clusters, self.config.clone())?;
        self.index.publish(index)
    }

    #[must_use]
    pub fn index_status(&self) -> IndexStatus {
        match self.index.snapshot() {
            None => IndexStatus::NotBuilt,
            Some(index) if index.is_stale(&self.store) => IndexStatus::Stale {
                built_at: index.built_generation().unwrap_or_default(),
                current: self.store.generation(),
            },
            Some(index) => IndexStatus::Ready {
                num_clusters: index.num_clusters(),
            },
        }
    }

    pub fn search_exact(&self, query: &[f64], k: usize) -> Result<SearchResult, VectorError> {
        self.exact().search(query, k)
    }

    /// Approximate search against the published index.
    ///
    /// # Errors
    /// - `IndexNotBuilt` before the first `build_index`
    /// - `IndexStale` if the store changed since the last build
    pub fn search_approximate(
        &self,
        query: &[f64],
        k: usize,
        num_probe: usize,
    ) -> Result<SearchResult, VectorError> {
        self.ready_index()?.search(query, k, num_probe)
    }

    pub fn search_batch_exact(
        &self,
        queries: &[Vec<f64>],
        k: usize,
    ) -> Result<Vec<SearchResult>, VectorError> {
        self.exact().search_batch(queries, k)
    }

    pub fn search_batch_approximate(
        &self,
        queries: &[Vec<f64>],
        k: usize,
        num_probe: usize,
    ) -> Result<Vec<SearchResult>, VectorError> {
        let index = self.ready_index()?;
        index.with_probe(num_probe).search_batch(queries, k)
    }

    #[must_use]
    pub fn exact(&self) -> ExactSearcher<'_> {
        ExactSearcher::new(&self.store, self.metric)
    }

    /// The published index, whether or not it is stale.
    #[must_use]
    pub fn index(&self) -> Option<Arc<IvfIndex>> {
        self.index.snapshot()
    }

    #[must_use]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn ready_index(&self) -> Result<Arc<IvfIndex>, VectorError> {
        let Some(index) = self.index.snapshot() else {
            return Err(VectorError::IndexNotBuilt {
                state: IndexState::Untrained,
            });
        };
        if index.is_stale(&self.store) {
            return Err(VectorError::IndexStale {
                built_at: index.built_generation().unwrap_or_default(),
                current: self.store.generation(),
            });
        }
        Ok(index)
    }

    fn note_mutation(&self) {
        if self.index.is_published() {
            tracing::debug!(
                generation = self.store.generation(),
                "store changed, published index is now stale"
            );
        }
    }
}
