//! Synthetic vector data.

use std::collections::HashSet;

use rand::distr::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::vector::{VectorError, VectorId, VectorRecord};

/// Vectors with every component drawn uniformly from `[low, high)`.
///
/// Identifiers are random 128-bit values, unique within the batch. The same
/// seed always yields the same records.
///
/// # Errors
/// `InvalidParameter` for a zero dimension or an empty or non-finite range.
pub fn generate_uniform(
    count: usize,
    dimension: usize,
    low: f64,
    high: f64,
    seed: u64,
) -> Result<Vec<VectorRecord>, VectorError> {
    validate_shape(dimension)?;
    // Also fails when high - low overflows
    let component = Uniform::new(low, high).map_err(|e| {
        VectorError::invalid_parameter(
            "range",
            format!("need finite low < high with a finite width, got [{low}, {high}): {e}"),
        )
    })?;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut ids = UniqueIds::with_capacity(count);
    Ok((0..count)
        .map(|_| {
            let id = ids.next(&mut rng);
            let vector = (0..dimension).map(|_| component.sample(&mut rng)).collect();
            VectorRecord::new(id, vector)
        })
        .collect())
}

/// Vectors scattered around `num_centers` random centers.
///
/// Centers are uniform in `[-1, 1)` per component, scaled by `spread`; each
/// point adds uniform noise of at most `noise` per component. Useful for
/// recall checks where the cluster structure is known.
pub fn generate_clustered(
    count: usize,
    dimension: usize,
    num_centers: usize,
    spread: f64,
    noise: f64,
    seed: u64,
) -> Result<Vec<VectorRecord>, VectorError> {
    validate_shape(dimension)?;
    if num_centers == 0 {
        return Err(VectorError::invalid_parameter(
            "num_centers",
            "at least one center is required",
        ));
    }
    if !(noise.is_finite() && noise >= 0.0) {
        return Err(VectorError::invalid_parameter(
            "noise",
            format!("must be finite and non-negative, got {noise}"),
        ));
    }
    // Components reach spread + noise in magnitude
    if !(spread.abs() + noise).is_finite() {
        return Err(VectorError::invalid_parameter(
            "spread",
            format!("spread {spread} plus noise {noise} exceeds the f64 range"),
        ));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let centers: Vec<Vec<f64>> = (0..num_centers)
        .map(|_| {
            (0..dimension)
                .map(|_| rng.random_range(-1.0..1.0) * spread)
                .collect()
        })
        .collect();

    let mut ids = UniqueIds::with_capacity(count);
    Ok((0..count)
        .map(|i| {
            let center = &centers[i % num_centers];
            let id = ids.next(&mut rng);
            let vector = center
                .iter()
                .map(|c| c + (rng.random::<f64>() * 2.0 - 1.0) * noise)
                .collect();
            VectorRecord::new(id, vector)
        })
        .collect())
}

fn validate_shape(dimension: usize) -> Result<(), VectorError> {
    if dimension == 0 {
        return Err(VectorError::InvalidDimension {
            dimension,
            reason: "generated vectors need at least one component",
        });
    }
    Ok(())
}

struct UniqueIds {
    seen: HashSet<u128>,
}

impl UniqueIds {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: HashSet::with_capacity(capacity),
        }
    }

    fn next(&mut self, rng: &mut StdRng) -> VectorId {
        loop {
            let candidate: u128 = rng.random();
            if self.seen.insert(candidate) {
                return VectorId::from_u128(candidate);
            }
        }
    }
}
