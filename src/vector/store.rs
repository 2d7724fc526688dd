//! In-memory vector store, the substrate every search strategy reads from.
//!
//! The store owns its vector buffers exclusively. Dimensionality is fixed by
//! the first insert (or up front with [`VectorStore::with_dimension`]) and a
//! failed insert never mutates the store. Every successful mutation bumps a
//! generation counter that indexes use to detect they are stale.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::vector::types::{VectorDimension, VectorError, VectorId};

/// A single `(identifier, vector)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: VectorId,
    pub vector: Vec<f64>,
}

impl VectorRecord {
    #[must_use]
    pub fn new(id: impl Into<VectorId>, vector: Vec<f64>) -> Self {
        Self {
            id: id.into(),
            vector,
        }
    }
}

/// Collection of vector records sharing one dimensionality.
#[derive(Debug, Clone, Default)]
pub struct VectorStore {
    records: Vec<VectorRecord>,
    positions: HashMap<VectorId, usize>,
    dimension: Option<VectorDimension>,
    generation: u64,
}

impl VectorStore {
    /// Creates an empty store whose dimension is fixed by the first insert.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store with a declared dimension.
    #[must_use]
    pub fn with_dimension(dimension: VectorDimension) -> Self {
        Self {
            dimension: Some(dimension),
            ..Self::default()
        }
    }

    /// Inserts one record.
    ///
    /// # Errors
    /// - `DimensionMismatch` if the length differs from the store dimension
    /// - `DuplicateId` if `id` is already stored (duplicates are rejected,
    ///   never overwritten)
    /// - `NonFiniteValue` if the vector contains NaN or infinity
    /// - `InvalidDimension` for an empty vector
    pub fn insert(&mut self, id: impl Into<VectorId>, vector: Vec<f64>) -> Result<(), VectorError> {
        let id = id.into();
        let dimension = self.check_record(&id, &vector)?;

        self.dimension = Some(dimension);
        self.positions.insert(id.clone(), self.records.len());
        self.records.push(VectorRecord { id, vector });
        self.generation += 1;
        Ok(())
    }

    /// Inserts a batch of records atomically.
    ///
    /// The whole batch is validated first, including duplicates within the
    /// batch itself. If any record fails, nothing is inserted and every
    /// failure is reported with its position in the batch. An empty batch is
    /// a no-op. Returns the number of records inserted.
    ///
    /// # Errors
    /// Returns `BatchRejected` listing each failing record.
    pub fn bulk_insert(
        &mut self,
        records: impl IntoIterator<Item = VectorRecord>,
    ) -> Result<usize, VectorError> {
        let records: Vec<VectorRecord> = records.into_iter().collect();
        if records.is_empty() {
            return Ok(0);
        }

        let mut failures = Vec::new();
        let mut batch_dimension = self.dimension;
        let mut seen: HashSet<&VectorId> = HashSet::with_capacity(records.len());

        for (position, record) in records.iter().enumerate() {
            let checked = match batch_dimension {
                Some(dim) => dim.validate_vector(&record.vector),
                None => VectorDimension::new(record.vector.len()).map(|dim| {
                    batch_dimension = Some(dim);
                }),
            }
            .and_then(|()| validate_finite(&record.vector))
            .and_then(|()| {
                if self.positions.contains_key(&record.id) || seen.contains(&record.id) {
                    Err(VectorError::DuplicateId(record.id.clone()))
                } else {
                    Ok(())
                }
            });

            match checked {
                Ok(()) => {
                    seen.insert(&record.id);
                }
                Err(err) => failures.push((position, err)),
            }
        }

        if !failures.is_empty() {
            tracing::debug!(
                rejected = failures.len(),
                batch = records.len(),
                "bulk insert rejected"
            );
            return Err(VectorError::BatchRejected { failures });
        }

        let inserted = records.len();
        self.records.reserve(inserted);
        self.positions.reserve(inserted);
        for record in records {
            self.positions.insert(record.id.clone(), self.records.len());
            self.records.push(record);
        }
        self.dimension = batch_dimension;
        self.generation += 1;
        Ok(inserted)
    }

    /// Removes a record, returning it if it was present.
    pub fn remove(&mut self, id: &VectorId) -> Option<VectorRecord> {
        let position = self.positions.remove(id)?;
        let record = self.records.swap_remove(position);
        if let Some(moved) = self.records.get(position) {
            self.positions.insert(moved.id.clone(), position);
        }
        self.generation += 1;
        Some(record)
    }

    /// Lazily enumerates every record without mutating the store.
    ///
    /// Call again to restart the enumeration; the order is insertion order
    /// until a removal reshuffles it.
    pub fn get_all(&self) -> impl ExactSizeIterator<Item = &VectorRecord> + Clone + '_ {
        self.records.iter()
    }

    /// Records as a contiguous slice, for parallel scans.
    #[must_use]
    pub fn records(&self) -> &[VectorRecord] {
        &self.records
    }

    #[must_use]
    pub fn get(&self, id: &VectorId) -> Option<&VectorRecord> {
        self.positions.get(id).map(|&pos| &self.records[pos])
    }

    #[must_use]
    pub fn contains(&self, id: &VectorId) -> bool {
        self.positions.contains_key(id)
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Store dimensionality, `None` until the first insert (unless declared).
    #[must_use]
    pub fn dimension(&self) -> Option<VectorDimension> {
        self.dimension
    }

    /// Mutation counter; changes whenever the stored set changes.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Validates a query vector against the store dimension.
    ///
    /// Queries against a store with no dimension yet are accepted; such a
    /// store is empty and yields an empty result.
    pub fn validate_query(&self, query: &[f64]) -> Result<(), VectorError> {
        if let Some(dim) = self.dimension {
            dim.validate_vector(query)?;
        }
        validate_finite(query)
    }

    fn check_record(&self, id: &VectorId, vector: &[f64]) -> Result<VectorDimension, VectorError> {
        let dimension = match self.dimension {
            Some(dim) => {
                dim.validate_vector(vector)?;
                dim
            }
            None => VectorDimension::new(vector.len())?,
        };
        validate_finite(vector)?;
        if self.positions.contains_key(id) {
            return Err(VectorError::DuplicateId(id.clone()));
        }
        Ok(dimension)
    }
}

fn validate_finite(vector: &[f64]) -> Result<(), VectorError> {
    match vector.iter().position(|v| !v.is_finite()) {
        Some(position) => Err(VectorError::NonFiniteValue { position }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn record(id: &str, vector: &[f64]) -> VectorRecord {
        VectorRecord::new(id, vector.to_vec())
    }

    #[test]
    fn test_insert_fixes_dimension() {
        let mut store = VectorStore::new();
        assert!(store.dimension().is_none());

        store.insert("a", vec![0.0, 1.0]).unwrap();
        assert_eq!(store.dimension().unwrap().get(), 2);
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn test_wrong_dimension_never_mutates() {
        let mut store = VectorStore::new();
        store.insert("a", vec![0.0, 1.0]).unwrap();
        let generation = store.generation();

        let err = store.insert("b", vec![0.0, 1.0, 2.0]).unwrap_err();
        assert_eq!(
            err,
            VectorError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        );
        assert_eq!(store.size(), 1);
        assert!(!store.contains(&VectorId::from("b")));
        assert_eq!(store.generation(), generation);
    }

    #[test]
    fn test_declared_dimension_rejects_first_insert() {
        let mut store = VectorStore::with_dimension(VectorDimension::new(3).unwrap());
        assert!(matches!(
            store.insert("a", vec![1.0]),
            Err(VectorError::DimensionMismatch { expected: 3, actual: 1 })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut store = VectorStore::new();
        store.insert("a", vec![0.0]).unwrap();
        assert_eq!(
            store.insert("a", vec![5.0]),
            Err(VectorError::DuplicateId(VectorId::from("a")))
        );
        assert_eq!(store.get(&VectorId::from("a")).unwrap().vector, vec![0.0]);
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut store = VectorStore::new();
        assert_eq!(
            store.insert("a", vec![0.0, f64::NAN]),
            Err(VectorError::NonFiniteValue { position: 1 })
        );
        assert!(store.is_empty());
        assert!(store.dimension().is_none());
    }

    #[test]
    fn test_bulk_insert_all_valid_round_trip() {
        let mut store = VectorStore::new();
        let batch = vec![
            record("a", &[0.0, 0.0]),
            record("b", &[1.0, 0.0]),
            record("c", &[0.0, 1.0]),
        ];

        assert_eq!(store.bulk_insert(batch.clone()).unwrap(), 3);

        let stored: HashSet<(String, Vec<u64>)> = store
            .get_all()
            .map(|r| (r.id.to_string(), r.vector.iter().map(|v| v.to_bits()).collect()))
            .collect();
        let expected: HashSet<(String, Vec<u64>)> = batch
            .iter()
            .map(|r| (r.id.to_string(), r.vector.iter().map(|v| v.to_bits()).collect()))
            .collect();
        assert_eq!(stored, expected);

        // Enumeration is restartable
        assert_eq!(store.get_all().count(), 3);
        assert_eq!(store.get_all().count(), 3);
    }

    #[test]
    fn test_bulk_insert_mixed_batch_rejected_whole() {
        let mut store = VectorStore::new();
        store.insert("existing", vec![0.0, 0.0]).unwrap();
        let generation = store.generation();

        let batch = vec![
            record("ok-1", &[1.0, 1.0]),
            record("short", &[1.0]),
            record("existing", &[2.0, 2.0]),
            record("ok-2", &[3.0, 3.0]),
            record("ok-2", &[4.0, 4.0]),
        ];

        let err = store.bulk_insert(batch).unwrap_err();
        let VectorError::BatchRejected { failures } = err else {
            panic!("expected BatchRejected, got {err:?}");
        };
        let positions: Vec<usize> = failures.iter().map(|(pos, _)| *pos).collect();
        assert_eq!(positions, vec![1, 2, 4]);
        assert!(matches!(failures[0].1, VectorError::DimensionMismatch { .. }));
        assert!(matches!(failures[1].1, VectorError::DuplicateId(_)));
        assert!(matches!(failures[2].1, VectorError::DuplicateId(_)));

        assert_eq!(store.size(), 1);
        assert!(!store.contains(&VectorId::from("ok-1")));
        assert_eq!(store.generation(), generation);
    }

    #[test]
    fn test_bulk_insert_first_record_sets_dimension() {
        let mut store = VectorStore::new();
        let err = store
            .bulk_insert(vec![record("a", &[1.0, 2.0]), record("b", &[1.0])])
            .unwrap_err();
        assert!(matches!(err, VectorError::BatchRejected { .. }));
        assert!(store.dimension().is_none());
    }

    #[test]
    fn test_empty_bulk_insert_is_noop() {
        let mut store = VectorStore::new();
        assert_eq!(store.bulk_insert(Vec::new()).unwrap(), 0);
        assert_eq!(store.generation(), 0);
    }

    #[test]
    fn test_remove_keeps_positions_consistent() {
        let mut store = VectorStore::new();
        store
            .bulk_insert(vec![
                record("a", &[0.0]),
                record("b", &[1.0]),
                record("c", &[2.0]),
            ])
            .unwrap();

        let removed = store.remove(&VectorId::from("a")).unwrap();
        assert_eq!(removed.vector, vec![0.0]);
        assert_eq!(store.size(), 2);
        assert_eq!(store.get(&VectorId::from("c")).unwrap().vector, vec![2.0]);
        assert_eq!(store.get(&VectorId::from("b")).unwrap().vector, vec![1.0]);
        assert!(store.remove(&VectorId::from("a")).is_none());
    }
}
