//! K-means clustering for IVF vector indexing.
//!
//! Lloyd's algorithm with K-means++ seeding, parameterized by the same
//! [`DistanceMetric`] the index searches with. Under the cosine metric the
//! centroids are re-normalized after every update (spherical k-means).
//!
//! # Algorithm Details
//! - Initialization: K-means++ with a seeded RNG, so a given config and
//!   input always produce the same centroids
//! - Assignment: nearest centroid, ties broken by the lowest centroid index
//! - Empty clusters: reseeded from the points farthest from their centroid
//! - Stops when assignments stop changing, centroid movement drops below
//!   the tolerance, or after `max_iterations`
//!
//! # Performance Characteristics
//! - O(n * k * d * iterations) time complexity
//! - O(k * d) space for centroids
//! - Assignment step runs on the rayon pool

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vector::distance::{DistanceMetric, norm};
use crate::vector::types::{ClusterId, VectorError};

/// Epsilon for floating-point comparisons.
const EPSILON: f64 = 1e-12;

/// Tuning knobs for k-means training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansConfig {
    /// Upper bound on Lloyd iterations.
    pub max_iterations: usize,
    /// Mean centroid movement below which training stops.
    pub tolerance: f64,
    /// Seed for K-means++ initialization and training-sample selection.
    pub seed: u64,
    /// Train on at most this many vectors; `None` trains on the full set.
    pub training_sample_size: Option<usize>,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-4,
            seed: 42,
            training_sample_size: None,
        }
    }
}

/// Result of K-means clustering operation.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansResult {
    /// Cluster centroids, each a vector of the same dimension as input vectors.
    pub centroids: Vec<Vec<f64>>,

    /// Cluster assignment for each input vector.
    pub assignments: Vec<ClusterId>,

    /// Number of iterations run.
    pub iterations: usize,

    /// Whether training stopped before hitting `max_iterations`.
    pub converged: bool,
}

/// Errors that can occur during clustering operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClusteringError {
    #[error(
        "Empty vector set provided for clustering\nSuggestion: Load vectors into the store before training"
    )]
    EmptyVectorSet,

    #[error("Invalid cluster count: {0}\nSuggestion: Use k between 1 and the number of vectors")]
    InvalidClusterCount(usize),

    #[error("Dimension mismatch in vectors\nSuggestion: Ensure all vectors share one dimensionality")]
    DimensionMismatch,

    #[error("Vector operation error: {0}")]
    Vector(#[from] VectorError),
}

/// Performs K-means clustering on a set of vectors.
///
/// # Arguments
/// * `vectors` - Input vectors to cluster (must be non-empty and same dimension)
/// * `k` - Number of clusters (must be >= 1 and <= number of vectors)
/// * `metric` - Distance used for seeding, assignment and convergence
/// * `config` - Iteration limits and seed
///
/// # Returns
/// * `KMeansResult` containing centroids, assignments, and iteration count
#[must_use = "clustering results should be used or the computation is wasted"]
pub fn kmeans_clustering(
    vectors: &[&[f64]],
    k: usize,
    metric: DistanceMetric,
    config: &KMeansConfig,
) -> Result<KMeansResult, ClusteringError> {
    if vectors.is_empty() {
        return Err(ClusteringError::EmptyVectorSet);
    }

    if k == 0 || k > vectors.len() {
        return Err(ClusteringError::InvalidClusterCount(k));
    }

    let dimension = vectors[0].len();
    if vectors.iter().any(|v| v.len() != dimension) {
        return Err(ClusteringError::DimensionMismatch);
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut centroids = initialize_centroids_kmeans_plus_plus(vectors, k, metric, &mut rng)?;
    let mut assignments: Vec<ClusterId> = Vec::new();
    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iterations.max(1) {
        iterations += 1;

        let nearest = assign_all(vectors, &centroids, metric)?;
        let new_assignments: Vec<ClusterId> = nearest.iter().map(|(c, _)| *c).collect();

        if new_assignments == assignments {
            converged = true;
            break;
        }
        assignments = new_assignments;

        let new_centroids = update_centroids(vectors, &nearest, &centroids, metric);
        let movement = calculate_centroid_movement(&centroids, &new_centroids, metric)?;
        centroids = new_centroids;

        if movement < config.tolerance {
            converged = true;
            break;
        }
    }

    // Centroids may have moved after the last assignment pass
    let assignments: Vec<ClusterId> = assign_all(vectors, &centroids, metric)?
        .into_iter()
        .map(|(c, _)| c)
        .collect();

    if !converged {
        tracing::warn!(
            iterations,
            k,
            "k-means did not converge within the iteration limit"
        );
    }

    Ok(KMeansResult {
        centroids,
        assignments,
        iterations,
        converged,
    })
}

/// Assigns a vector to the nearest centroid.
///
/// Ties go to the lowest centroid index. Returns the cluster and the
/// distance to its centroid.
pub fn assign_to_nearest_centroid(
    vector: &[f64],
    centroids: &[Vec<f64>],
    metric: DistanceMetric,
) -> Result<(ClusterId, f64), VectorError> {
    let mut best_distance = f64::INFINITY;
    let mut best_cluster = 0;

    for (i, centroid) in centroids.iter().enumerate() {
        let distance = metric.distance(vector, centroid)?;
        if distance < best_distance {
            best_distance = distance;
            best_cluster = i;
        }
    }

    Ok((ClusterId::from_index(best_cluster), best_distance))
}

fn assign_all(
    vectors: &[&[f64]],
    centroids: &[Vec<f64>],
    metric: DistanceMetric,
) -> Result<Vec<(ClusterId, f64)>, VectorError> {
    vectors
        .par_iter()
        .map(|vector| assign_to_nearest_centroid(vector, centroids, metric))
        .collect()
}

/// Recomputes centroids as the mean of their assigned vectors.
fn update_centroids(
    vectors: &[&[f64]],
    nearest: &[(ClusterId, f64)],
    previous: &[Vec<f64>],
    metric: DistanceMetric,
) -> Vec<Vec<f64>> {
    let k = previous.len();
    let dimension = vectors[0].len();
    let mut sizes = vec![0usize; k];
    for (cluster, _) in nearest {
        sizes[cluster.index()] += 1;
    }

    // Each member is divided before summing so large components cannot
    // overflow the running total
    let mut means = vec![vec![0.0; dimension]; k];
    for (vector, (cluster, _)) in vectors.iter().zip(nearest) {
        let slot = cluster.index();
        let size = sizes[slot] as f64;
        for (mean, value) in means[slot].iter_mut().zip(vector.iter()) {
            *mean += value / size;
        }
    }

    // Farthest points first, used to reseed empty clusters
    let mut reseed_order: Vec<usize> = (0..vectors.len()).collect();
    reseed_order.sort_by(|&a, &b| nearest[b].1.total_cmp(&nearest[a].1).then(a.cmp(&b)));
    let mut reseeds = reseed_order.into_iter();

    means
        .into_iter()
        .zip(sizes)
        .enumerate()
        .map(|(slot, (mut centroid, size))| {
            if size == 0 {
                return match reseeds.next() {
                    Some(idx) => prepare_centroid(vectors[idx], metric),
                    None => previous[slot].clone(),
                };
            }
            if metric == DistanceMetric::Cosine {
                if norm(&centroid) < EPSILON {
                    // Opposing members cancelled out
                    return previous[slot].clone();
                }
                normalize_vector(&mut centroid);
            }
            centroid
        })
        .collect()
}

/// Initializes centroids using the K-means++ algorithm.
///
/// Picks each new centroid with probability proportional to its squared
/// distance from the nearest existing one. When every remaining point
/// coincides with a chosen centroid, the rest are filled with unchosen
/// points in input order.
fn initialize_centroids_kmeans_plus_plus(
    vectors: &[&[f64]],
    k: usize,
    metric: DistanceMetric,
    rng: &mut StdRng,
) -> Result<Vec<Vec<f64>>, ClusteringError> {
    let mut centroids = Vec::with_capacity(k);
    let mut chosen = vec![false; vectors.len()];

    let first_idx = rng.random_range(0..vectors.len());
    chosen[first_idx] = true;
    centroids.push(prepare_centroid(vectors[first_idx], metric));

    // Distance to the nearest chosen centroid so far
    let mut nearest: Vec<f64> = vectors
        .par_iter()
        .map(|v| metric.distance(v, &centroids[0]))
        .collect::<Result<_, _>>()?;

    while centroids.len() < k {
        let farthest = nearest.iter().fold(0.0_f64, |max, &d| max.max(d));
        let next_idx = if farthest == 0.0 {
            // All points coincide with existing centroids
            chosen.iter().position(|&c| !c)
        } else {
            // Squared distances relative to the farthest point stay finite
            let weights: Vec<f64> = nearest
                .iter()
                .map(|&d| {
                    let r = d / farthest;
                    r * r
                })
                .collect();
            let total: f64 = weights.iter().sum();
            let target = rng.random::<f64>() * total;
            let mut cumulative = 0.0;
            weights
                .iter()
                .position(|&w| {
                    cumulative += w;
                    w > 0.0 && cumulative >= target
                })
                // Rounding can leave target just past the sum
                .or_else(|| weights.iter().rposition(|&w| w > 0.0))
        };

        let Some(idx) = next_idx else {
            break;
        };
        chosen[idx] = true;
        let centroid = prepare_centroid(vectors[idx], metric);

        nearest
            .par_iter_mut()
            .zip(vectors.par_iter())
            .try_for_each(|(current, v)| -> Result<(), VectorError> {
                *current = current.min(metric.distance(v, &centroid)?);
                Ok(())
            })?;
        centroids.push(centroid);
    }

    debug_assert_eq!(centroids.len(), k);
    Ok(centroids)
}

/// Calculates the mean movement of centroids between iterations.
fn calculate_centroid_movement(
    old: &[Vec<f64>],
    new: &[Vec<f64>],
    metric: DistanceMetric,
) -> Result<f64, VectorError> {
    let total = old
        .iter()
        .zip(new.iter())
        .map(|(old_c, new_c)| metric.distance(old_c, new_c))
        .sum::<Result<f64, _>>()?;
    Ok(total / old.len() as f64)
}

/// Copies a vector for use as a centroid, unit-normalized under cosine.
fn prepare_centroid(vector: &[f64], metric: DistanceMetric) -> Vec<f64> {
    let mut centroid = vector.to_vec();
    if metric == DistanceMetric::Cosine {
        normalize_vector(&mut centroid);
    }
    centroid
}

/// Normalizes a vector in-place to unit length.
fn normalize_vector(vector: &mut [f64]) {
    let n = norm(vector);
    if n > EPSILON {
        for value in vector.iter_mut() {
            *value /= n;
        }
    }
}
