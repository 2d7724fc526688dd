//! Type-safe wrappers and core types for vector search functionality.
//!
//! Newtypes for identifiers, dimensions and distances keep the search code
//! free of primitive obsession, and `VectorError` is the single typed failure
//! taxonomy shared by the store, the searchers and the index.

use std::cmp::Ordering;
use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque, totally ordered identifier for a stored vector.
///
/// Identifiers compare lexically, which is the tie-break order used by every
/// search strategy. 128-bit identifiers are carried as 32 hex digits so they
/// sort the same way as their numeric value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorId(String);

impl VectorId {
    /// Creates an identifier from any string-like token.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates an identifier from a 128-bit value.
    #[must_use]
    pub fn from_u128(value: u128) -> Self {
        Self(format!("{value:032x}"))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VectorId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for VectorId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Type-safe wrapper for cluster IDs in IVF indexing.
///
/// Clusters are identified by non-zero IDs to prevent confusion
/// with uninitialized or error states. `index()` gives the 0-based slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId(NonZeroU32);

impl ClusterId {
    /// Creates a new `ClusterId` from a non-zero u32.
    ///
    /// Returns `None` if the provided ID is zero.
    #[must_use]
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(Self)
    }

    /// Creates the `ClusterId` for a 0-based centroid slot.
    ///
    /// # Panics
    /// Panics if `index + 1` does not fit in a u32.
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        let id = u32::try_from(index + 1).expect("cluster index exceeds u32 range");
        Self(NonZeroU32::new(id).expect("index + 1 is never zero"))
    }

    /// Returns the underlying u32 value.
    #[must_use]
    pub fn get(&self) -> u32 {
        self.0.get()
    }

    /// Returns the 0-based slot of this cluster.
    #[must_use]
    pub fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dissimilarity between two vectors; smaller is closer.
///
/// Ordered with `f64::total_cmp` so it can key heaps and sorts directly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Distance(f64);

impl Distance {
    #[must_use]
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(&self) -> f64 {
        self.0
    }
}

impl PartialEq for Distance {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Distance {}

impl PartialOrd for Distance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Distance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// Type-safe wrapper for vector dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> Result<Self, VectorError> {
        if dim == 0 {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        Ok(Self(dim))
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has the expected dimension.
    pub fn validate_vector(&self, vector: &[f64]) -> Result<(), VectorError> {
        if vector.len() != self.0 {
            return Err(VectorError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl TryFrom<usize> for VectorDimension {
    type Error = VectorError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VectorDimension> for usize {
    fn from(value: VectorDimension) -> Self {
        value.0
    }
}

/// One ranked neighbor of a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: VectorId,
    pub distance: Distance,
}

impl SearchHit {
    #[must_use]
    pub fn new(id: VectorId, distance: f64) -> Self {
        Self {
            id,
            distance: Distance::new(distance),
        }
    }
}

impl PartialOrd for SearchHit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchHit {
    /// Ascending distance, ties broken by ascending identifier.
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Ranked neighbors for a single query, closest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchResult {
    hits: Vec<SearchHit>,
}

impl SearchResult {
    /// An empty result (used for empty stores, which are not an error).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wraps hits that are already sorted by `SearchHit`'s ordering.
    pub(crate) fn from_sorted(hits: Vec<SearchHit>) -> Self {
        debug_assert!(hits.windows(2).all(|w| w[0] <= w[1]));
        Self { hits }
    }

    #[must_use]
    pub fn hits(&self) -> &[SearchHit] {
        &self.hits
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Identifiers in rank order.
    pub fn ids(&self) -> impl Iterator<Item = &VectorId> {
        self.hits.iter().map(|hit| &hit.id)
    }

    /// `(id, distance)` pairs in rank order.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, f64)> {
        self.hits
            .iter()
            .map(|hit| (hit.id.to_string(), hit.distance.get()))
            .collect()
    }
}

impl IntoIterator for SearchResult {
    type Item = SearchHit;
    type IntoIter = std::vec::IntoIter<SearchHit>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.into_iter()
    }
}

/// Lifecycle of an approximate index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Untrained,
    Trained,
    Populated,
    Ready,
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Untrained => "untrained",
            Self::Trained => "trained",
            Self::Populated => "populated",
            Self::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during vector operations.
///
/// All error messages include actionable suggestions for resolution.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VectorError {
    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure all vectors and queries use the same dimensionality"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    #[error("Duplicate vector ID: {0}\nSuggestion: Identifiers must be unique within a store")]
    DuplicateId(VectorId),

    #[error(
        "Batch rejected: {} record(s) failed validation, first at position {}\nSuggestion: Fix or drop the listed records and resubmit the batch",
        .failures.len(),
        .failures.first().map(|(pos, _)| *pos).unwrap_or_default()
    )]
    BatchRejected { failures: Vec<(usize, VectorError)> },

    #[error(
        "Not enough vectors to train: {required} clusters requested, {available} vectors stored\nSuggestion: Lower num_clusters or load more vectors"
    )]
    InsufficientData { required: usize, available: usize },

    #[error("Index is not ready (state: {state})\nSuggestion: Build the index before querying it")]
    IndexNotBuilt { state: IndexState },

    #[error(
        "Index is stale: built at store generation {built_at}, store is at {current}\nSuggestion: Rebuild the index after inserting or removing vectors"
    )]
    IndexStale { built_at: u64, current: u64 },

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: String,
    },

    #[error(
        "Cosine distance is undefined for a zero-magnitude vector\nSuggestion: Use the Euclidean metric or drop zero vectors"
    )]
    ZeroVector,

    #[error("Vector contains a non-finite value at position {position}")]
    NonFiniteValue { position: usize },

    #[error(
        "Distance between two vectors exceeds the f64 range\nSuggestion: Rescale the vectors before loading them"
    )]
    DistanceOverflow,
}

impl VectorError {
    /// Convenience constructor for parameter validation failures.
    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Get a stable status code for this error type.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::InvalidDimension { .. } => "INVALID_DIMENSION",
            Self::DuplicateId(_) => "DUPLICATE_ID",
            Self::BatchRejected { .. } => "BATCH_REJECTED",
            Self::InsufficientData { .. } => "INSUFFICIENT_DATA",
            Self::IndexNotBuilt { .. } => "INDEX_NOT_BUILT",
            Self::IndexStale { .. } => "INDEX_STALE",
            Self::InvalidParameter { .. } => "INVALID_PARAMETER",
            Self::ZeroVector => "ZERO_VECTOR",
            Self::NonFiniteValue { .. } => "NON_FINITE_VALUE",
            Self::DistanceOverflow => "DISTANCE_OVERFLOW",
        }
    }
}

/// Validates a top-k request size.
pub(crate) fn validate_k(k: usize) -> Result<(), VectorError> {
    if k == 0 {
        return Err(VectorError::invalid_parameter("k", "must be at least 1"));
    }
    Ok(())
}
