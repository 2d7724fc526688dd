//! Nearest-neighbor search over in-memory vectors.
//!
//! # Architecture
//! Records live in a [`VectorStore`]. [`ExactSearcher`] scans every record
//! and is the ground truth. [`IvfIndex`] partitions the store with k-means
//! (Inverted File with Flat vectors) and answers queries by scanning only the
//! `num_probe` clusters nearest to the query. With every cluster probed the
//! IVF answer equals the exact one.
//!
//! [`VectorSearchEngine`] ties these together and publishes rebuilt indexes
//! to concurrent readers through [`SharedIndex`].

mod clustering;
mod distance;
mod engine;
mod exact;
mod ivf;
mod shared;
mod store;
mod strategy;
mod topk;
mod types;

pub use clustering::{
    ClusteringError, KMeansConfig, KMeansResult, assign_to_nearest_centroid, kmeans_clustering,
};
pub use distance::{DistanceMetric, cosine_distance, euclidean_distance};
pub use engine::{IndexStatus, VectorSearchEngine};
pub use exact::ExactSearcher;
pub use ivf::{Cluster, IvfIndex, ProbedIndex};
pub use shared::SharedIndex;
pub use store::{VectorRecord, VectorStore};
pub use strategy::SearchStrategy;
pub use topk::TopK;
pub use types::{
    ClusterId, Distance, IndexState, SearchHit, SearchResult, VectorDimension, VectorError,
    VectorId,
};
