//! Inverted-file (IVF-flat) approximate index.
//!
//! The store is partitioned into clusters around k-means centroids; a query
//! only scans the `num_probe` clusters whose centroids are nearest to it.
//! Each inverted list keeps flat copies of its members' vectors so a built
//! index is self-contained and can be shared across threads.
//!
//! Lifecycle: `Untrained → Trained → Populated → Ready`. Only a `Ready`
//! index answers queries. [`IvfIndex::build`] runs the whole pipeline off to
//! the side and returns a `Ready` index, which is how indexes are published.

use std::collections::HashMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::vector::clustering::{
    ClusteringError, KMeansConfig, assign_to_nearest_centroid, kmeans_clustering,
};
use crate::vector::distance::DistanceMetric;
use crate::vector::exact::{PARALLEL_SCAN_THRESHOLD, rank_candidates};
use crate::vector::store::VectorStore;
use crate::vector::strategy::SearchStrategy;
use crate::vector::topk::TopK;
use crate::vector::types::{
    ClusterId, IndexState, SearchResult, VectorDimension, VectorError, VectorId, validate_k,
};

/// One inverted list: a centroid and the vectors assigned to it.
#[derive(Debug, Clone)]
pub struct Cluster {
    id: ClusterId,
    centroid: Vec<f64>,
    members: Vec<VectorId>,
    /// Member vectors, row-major, one row per entry in `members`.
    vectors: Vec<f64>,
    dimension: usize,
}

impl Cluster {
    fn new(id: ClusterId, centroid: Vec<f64>) -> Self {
        let dimension = centroid.len();
        Self {
            id,
            centroid,
            members: Vec::new(),
            vectors: Vec::new(),
            dimension,
        }
    }

    #[must_use]
    pub fn id(&self) -> ClusterId {
        self.id
    }

    #[must_use]
    pub fn centroid(&self) -> &[f64] {
        &self.centroid
    }

    /// Identifiers assigned to this cluster, in ascending order once ready.
    #[must_use]
    pub fn members(&self) -> &[VectorId] {
        &self.members
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn push(&mut self, id: VectorId, vector: &[f64]) {
        self.members.push(id);
        self.vectors.extend_from_slice(vector);
    }

    fn entries(&self) -> impl Iterator<Item = (&VectorId, &[f64])> {
        self.members
            .iter()
            .zip(self.vectors.chunks_exact(self.dimension))
    }

    /// Sorts members by id so scans visit them in a stable order.
    fn seal(&mut self) {
        let mut order: Vec<usize> = (0..self.members.len()).collect();
        order.sort_by(|&a, &b| self.members[a].cmp(&self.members[b]));

        let mut members = Vec::with_capacity(order.len());
        let mut vectors = Vec::with_capacity(self.vectors.len());
        for idx in order {
            members.push(self.members[idx].clone());
            let start = idx * self.dimension;
            vectors.extend_from_slice(&self.vectors[start..start + self.dimension]);
        }
        self.members = members;
        self.vectors = vectors;
    }
}

/// Clustered approximate nearest-neighbor index.
#[derive(Debug, Clone)]
pub struct IvfIndex {
    metric: DistanceMetric,
    config: KMeansConfig,
    state: IndexState,
    dimension: Option<VectorDimension>,
    clusters: Vec<Cluster>,
    assignments: HashMap<VectorId, ClusterId>,
    built_generation: Option<u64>,
    training_iterations: usize,
}

impl IvfIndex {
    /// Creates an untrained index.
    #[must_use]
    pub fn new(metric: DistanceMetric, config: KMeansConfig) -> Self {
        Self {
            metric,
            config,
            state: IndexState::Untrained,
            dimension: None,
            clusters: Vec::new(),
            assignments: HashMap::new(),
            built_generation: None,
            training_iterations: 0,
        }
    }

    /// Trains, populates and finalizes an index in one step.
    ///
    /// The returned index is `Ready` and independent of the store.
    pub fn build(
        store: &VectorStore,
        metric: DistanceMetric,
        num_clusters: usize,
        config: KMeansConfig,
    ) -> Result<Self, VectorError> {
        let mut index = Self::new(metric, config);
        index.train(store, num_clusters)?;
        index.populate(store)?;
        index.finalize()?;
        Ok(index)
    }

    /// Learns `num_clusters` centroids from the stored vectors.
    ///
    /// Discards any previous centroids and memberships. Trains on a seeded
    /// sample when `training_sample_size` is smaller than the store.
    ///
    /// # Errors
    /// - `InvalidParameter` if `num_clusters == 0`
    /// - `InsufficientData` if the store holds fewer than `num_clusters` vectors
    /// - `ZeroVector` under the cosine metric when a stored vector is zero
    pub fn train(&mut self, store: &VectorStore, num_clusters: usize) -> Result<(), VectorError> {
        if num_clusters == 0 {
            return Err(VectorError::invalid_parameter(
                "num_clusters",
                "must be at least 1",
            ));
        }
        if store.size() < num_clusters {
            return Err(VectorError::InsufficientData {
                required: num_clusters,
                available: store.size(),
            });
        }

        let records = store.records();
        let sample: Vec<&[f64]> = match self.config.training_sample_size {
            Some(limit) if limit.max(num_clusters) < records.len() => {
                let amount = limit.max(num_clusters);
                let mut rng = StdRng::seed_from_u64(self.config.seed);
                let mut picked = rand::seq::index::sample(&mut rng, records.len(), amount).into_vec();
                picked.sort_unstable();
                picked
                    .into_iter()
                    .map(|i| records[i].vector.as_slice())
                    .collect()
            }
            _ => records.iter().map(|r| r.vector.as_slice()).collect(),
        };

        tracing::debug!(
            num_clusters,
            sample = sample.len(),
            stored = records.len(),
            metric = %self.metric,
            "training ivf centroids"
        );

        let result = kmeans_clustering(&sample, num_clusters, self.metric, &self.config).map_err(
            |err| match err {
                ClusteringError::Vector(inner) => inner,
                ClusteringError::EmptyVectorSet | ClusteringError::InvalidClusterCount(_) => {
                    VectorError::InsufficientData {
                        required: num_clusters,
                        available: sample.len(),
                    }
                }
                ClusteringError::DimensionMismatch => VectorError::invalid_parameter(
                    "store",
                    "training vectors do not share one dimensionality",
                ),
            },
        )?;

        self.clusters = result
            .centroids
            .into_iter()
            .enumerate()
            .map(|(slot, centroid)| Cluster::new(ClusterId::from_index(slot), centroid))
            .collect();
        self.assignments.clear();
        self.dimension = store.dimension();
        self.built_generation = None;
        self.training_iterations = result.iterations;
        self.state = IndexState::Trained;
        Ok(())
    }

    /// Assigns every stored vector to its nearest centroid.
    ///
    /// Ties go to the lowest cluster index. Memberships are rebuilt from
    /// scratch; there is no incremental update.
    ///
    /// # Errors
    /// - `IndexNotBuilt` if the index has not been trained
    /// - `DimensionMismatch` if the store dimension differs from training
    pub fn populate(&mut self, store: &VectorStore) -> Result<(), VectorError> {
        if self.state == IndexState::Untrained {
            return Err(VectorError::IndexNotBuilt { state: self.state });
        }
        if let (Some(trained), Some(current)) = (self.dimension, store.dimension()) {
            if trained != current {
                return Err(VectorError::DimensionMismatch {
                    expected: trained.get(),
                    actual: current.get(),
                });
            }
        }

        let centroids: Vec<Vec<f64>> = self.clusters.iter().map(|c| c.centroid.clone()).collect();
        let assigned: Vec<ClusterId> = store
            .records()
            .par_iter()
            .map(|record| {
                assign_to_nearest_centroid(&record.vector, &centroids, self.metric)
                    .map(|(cluster, _)| cluster)
            })
            .collect::<Result<_, _>>()?;

        for cluster in &mut self.clusters {
            cluster.members.clear();
            cluster.vectors.clear();
        }
        self.assignments.clear();
        self.assignments.reserve(store.size());
        for (record, cluster_id) in store.records().iter().zip(assigned) {
            self.clusters[cluster_id.index()].push(record.id.clone(), &record.vector);
            self.assignments.insert(record.id.clone(), cluster_id);
        }

        self.built_generation = Some(store.generation());
        self.state = IndexState::Populated;
        Ok(())
    }

    /// Marks a populated index ready for queries.
    pub fn finalize(&mut self) -> Result<(), VectorError> {
        if self.state != IndexState::Populated {
            return Err(VectorError::IndexNotBuilt { state: self.state });
        }
        self.clusters.par_iter_mut().for_each(|cluster| {
            cluster.seal();
            cluster.members.shrink_to_fit();
            cluster.vectors.shrink_to_fit();
        });
        self.state = IndexState::Ready;

        let largest = self.clusters.iter().map(Cluster::len).max().unwrap_or(0);
        let empty = self.clusters.iter().filter(|c| c.is_empty()).count();
        tracing::info!(
            clusters = self.clusters.len(),
            vectors = self.assignments.len(),
            largest,
            empty,
            iterations = self.training_iterations,
            "ivf index ready"
        );
        Ok(())
    }

    /// Returns the `k` nearest vectors among the `num_probe` nearest clusters.
    ///
    /// `num_probe` larger than the cluster count is clamped. With
    /// `num_probe == num_clusters` the result equals exact search.
    ///
    /// # Errors
    /// - `IndexNotBuilt` unless the index is `Ready`
    /// - `InvalidParameter` if `k == 0` or `num_probe == 0`
    /// - `DimensionMismatch` if the query length differs from the index
    pub fn search(
        &self,
        query: &[f64],
        k: usize,
        num_probe: usize,
    ) -> Result<SearchResult, VectorError> {
        if self.state != IndexState::Ready {
            return Err(VectorError::IndexNotBuilt { state: self.state });
        }
        validate_k(k)?;
        let probed = self.probe(query, num_probe)?;

        let candidates: usize = probed.iter().map(|c| self.clusters[c.index()].len()).sum();
        let top = if probed.len() == 1 || candidates < PARALLEL_SCAN_THRESHOLD {
            let mut top = TopK::new(k);
            for cluster_id in &probed {
                let cluster = &self.clusters[cluster_id.index()];
                top = top.merge(rank_candidates(cluster.entries(), query, k, self.metric)?);
            }
            top
        } else {
            probed
                .par_iter()
                .map(|cluster_id| {
                    let cluster = &self.clusters[cluster_id.index()];
                    rank_candidates(cluster.entries(), query, k, self.metric)
                })
                .try_reduce(|| TopK::new(k), |a, b| Ok(a.merge(b)))?
        };
        Ok(top.into_result())
    }

    /// The `num_probe` clusters nearest to `query`, nearest first.
    ///
    /// Centroid distance ties go to the lowest cluster index.
    pub fn probe(&self, query: &[f64], num_probe: usize) -> Result<Vec<ClusterId>, VectorError> {
        if num_probe == 0 {
            return Err(VectorError::invalid_parameter(
                "num_probe",
                "must be at least 1",
            ));
        }
        let Some(dimension) = self.dimension else {
            return Err(VectorError::IndexNotBuilt { state: self.state });
        };
        dimension.validate_vector(query)?;
        if let Some(position) = query.iter().position(|v| !v.is_finite()) {
            return Err(VectorError::NonFiniteValue { position });
        }

        let mut ranked: Vec<(f64, usize)> = self
            .clusters
            .iter()
            .enumerate()
            .map(|(slot, cluster)| {
                self.metric
                    .distance(query, &cluster.centroid)
                    .map(|d| (d, slot))
            })
            .collect::<Result<_, _>>()?;
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        Ok(ranked
            .into_iter()
            .take(num_probe.min(self.clusters.len()))
            .map(|(_, slot)| ClusterId::from_index(slot))
            .collect())
    }

    /// Binds a probe count, giving a [`SearchStrategy`].
    #[must_use]
    pub fn with_probe(&self, num_probe: usize) -> ProbedIndex<'_> {
        ProbedIndex {
            index: self,
            num_probe,
        }
    }

    /// True when the store changed since this index was populated from it.
    #[must_use]
    pub fn is_stale(&self, store: &VectorStore) -> bool {
        self.built_generation != Some(store.generation())
    }

    /// Store generation this index was populated at.
    #[must_use]
    pub fn built_generation(&self) -> Option<u64> {
        self.built_generation
    }

    #[must_use]
    pub fn state(&self) -> IndexState {
        self.state
    }

    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    #[must_use]
    pub fn num_clusters(&self) -> usize {
        self.clusters.len()
    }

    #[must_use]
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    #[must_use]
    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id.index())
    }

    /// Cluster a vector was assigned to at population time.
    #[must_use]
    pub fn cluster_of(&self, id: &VectorId) -> Option<ClusterId> {
        self.assignments.get(id).copied()
    }

    /// Number of indexed vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    #[must_use]
    pub fn training_iterations(&self) -> usize {
        self.training_iterations
    }
}

/// An [`IvfIndex`] paired with a fixed probe count.
#[derive(Debug, Clone, Copy)]
pub struct ProbedIndex<'a> {
    index: &'a IvfIndex,
    num_probe: usize,
}

impl ProbedIndex<'_> {
    #[must_use]
    pub fn num_probe(&self) -> usize {
        self.num_probe
    }
}

impl SearchStrategy for ProbedIndex<'_> {
    fn name(&self) -> String {
        format!(
            "ivf ({}, clusters={}, probe={})",
            self.index.metric,
            self.index.num_clusters(),
            self.num_probe.min(self.index.num_clusters())
        )
    }

    fn search(&self, query: &[f64], k: usize) -> Result<SearchResult, VectorError> {
        self.index.search(query, k, self.num_probe)
    }
}
