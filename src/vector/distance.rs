//! Distance metrics shared by every search strategy.
//!
//! Both metrics return a dissimilarity (smaller is closer) so exact and
//! approximate search can rank candidates with the same ordering.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::vector::types::VectorError;

/// Pluggable dissimilarity function between two vectors of equal length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `sqrt(sum((a_i - b_i)^2))`
    #[default]
    #[serde(alias = "l2")]
    Euclidean,
    /// `1 - (a . b) / (|a| |b|)`; undefined for zero-magnitude operands.
    Cosine,
}

impl DistanceMetric {
    /// Computes the distance between `a` and `b`.
    ///
    /// Callers validate dimensions first; lengths are only debug-asserted here.
    ///
    /// # Errors
    /// - `ZeroVector` for the cosine metric when either operand has zero magnitude
    /// - `DistanceOverflow` when the distance is not representable as a finite `f64`
    #[inline]
    pub fn distance(&self, a: &[f64], b: &[f64]) -> Result<f64, VectorError> {
        debug_assert_eq!(a.len(), b.len(), "Vectors must have same dimension");
        let distance = match self {
            Self::Euclidean => euclidean_distance(a, b),
            Self::Cosine => cosine_distance(a, b)?,
        };
        if distance.is_finite() {
            Ok(distance)
        } else {
            Err(VectorError::DistanceOverflow)
        }
    }

    /// Short name used in reports and config files.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Euclidean => "euclidean",
            Self::Cosine => "cosine",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = VectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "euclidean" | "l2" => Ok(Self::Euclidean),
            "cosine" => Ok(Self::Cosine),
            other => Err(VectorError::invalid_parameter(
                "metric",
                format!("unknown metric '{other}', expected 'euclidean' (or 'l2') or 'cosine'"),
            )),
        }
    }
}

/// Euclidean (L2) distance.
///
/// Squares are summed directly when that stays inside the normal `f64`
/// range, otherwise both operands are rescaled by their largest component
/// first. The result is `inf` only when the distance itself exceeds
/// `f64::MAX`.
#[inline]
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    let sum = sum_of_squares(a.iter().zip(b).map(|(x, y)| x - y));
    if is_well_scaled(sum) {
        return sum.sqrt();
    }

    let scale = max_abs(a).max(max_abs(b));
    if scale == 0.0 || !scale.is_finite() {
        return sum.sqrt();
    }
    scale * sum_of_squares(a.iter().zip(b).map(|(x, y)| x / scale - y / scale)).sqrt()
}

/// Cosine distance, `1 - cosine_similarity`.
///
/// Clamped to `[0, 2]` to absorb rounding on (anti-)parallel vectors.
/// Operands whose squared norms leave the normal `f64` range are rescaled
/// to a unit max component, which leaves the angle unchanged.
pub fn cosine_distance(a: &[f64], b: &[f64]) -> Result<f64, VectorError> {
    let similarity = match cosine_similarity(a, b) {
        Some(similarity) => similarity,
        None => {
            let (a, b) = (rescaled(a)?, rescaled(b)?);
            cosine_similarity(&a, &b).ok_or(VectorError::ZeroVector)?
        }
    };
    Ok((1.0 - similarity).clamp(0.0, 2.0))
}

/// `None` when a squared norm overflowed, underflowed or is zero.
fn cosine_similarity(a: &[f64], b: &[f64]) -> Option<f64> {
    let (norm_a, norm_b) = (dot(a, a), dot(b, b));
    if !(is_well_scaled(norm_a) && is_well_scaled(norm_b)) {
        return None;
    }
    Some(dot(a, b) / (norm_a.sqrt() * norm_b.sqrt()))
}

fn rescaled(v: &[f64]) -> Result<Vec<f64>, VectorError> {
    if let Some(position) = v.iter().position(|x| !x.is_finite()) {
        return Err(VectorError::NonFiniteValue { position });
    }
    let scale = max_abs(v);
    if scale == 0.0 {
        return Err(VectorError::ZeroVector);
    }
    Ok(v.iter().map(|x| x / scale).collect())
}

#[inline]
fn is_well_scaled(sum: f64) -> bool {
    sum.is_finite() && sum >= f64::MIN_POSITIVE
}

#[inline]
fn sum_of_squares(values: impl Iterator<Item = f64>) -> f64 {
    values.map(|d| d * d).sum()
}

#[inline]
fn max_abs(v: &[f64]) -> f64 {
    v.iter().fold(0.0_f64, |max, x| max.max(x.abs()))
}

#[inline]
pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Euclidean norm, rescaled when the squared sum leaves the normal range.
pub(crate) fn norm(v: &[f64]) -> f64 {
    let sum = dot(v, v);
    if is_well_scaled(sum) {
        return sum.sqrt();
    }
    let scale = max_abs(v);
    if scale == 0.0 || !scale.is_finite() {
        return scale;
    }
    scale * sum_of_squares(v.iter().map(|x| x / scale)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_euclidean_distance() {
        let a = [0.0, 0.0];
        let b = [3.0, 4.0];
        assert!((DistanceMetric::Euclidean.distance(&a, &b).unwrap() - 5.0).abs() < EPS);
        assert_eq!(DistanceMetric::Euclidean.distance(&a, &a).unwrap(), 0.0);
    }

    #[test]
    fn test_cosine_distance() {
        // Identical direction
        let a = [1.0, 2.0, 3.0];
        let b = [2.0, 4.0, 6.0];
        assert!(DistanceMetric::Cosine.distance(&a, &b).unwrap().abs() < EPS);

        // Orthogonal
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!((DistanceMetric::Cosine.distance(&a, &b).unwrap() - 1.0).abs() < EPS);

        // Opposite
        let a = [1.0, 2.0, 3.0];
        let b = [-1.0, -2.0, -3.0];
        assert!((DistanceMetric::Cosine.distance(&a, &b).unwrap() - 2.0).abs() < EPS);
    }

    #[test]
    fn test_cosine_zero_vector_is_an_error() {
        let zero = [0.0, 0.0, 0.0];
        let a = [1.0, 2.0, 3.0];
        assert_eq!(
            DistanceMetric::Cosine.distance(&a, &zero),
            Err(VectorError::ZeroVector)
        );
        assert_eq!(
            DistanceMetric::Cosine.distance(&zero, &a),
            Err(VectorError::ZeroVector)
        );
        // Euclidean has no such restriction
        assert!(DistanceMetric::Euclidean.distance(&zero, &a).is_ok());
    }

    #[test]
    fn test_cosine_ranks_extreme_magnitudes_by_angle() {
        let query = [1e200, 1e200];
        let same = [1.0, 1.0];
        let opposite = [-1e200, -1e200];
        let cosine = DistanceMetric::Cosine;
        assert!(cosine.distance(&query, &same).unwrap().abs() < EPS);
        assert!((cosine.distance(&query, &opposite).unwrap() - 2.0).abs() < EPS);

        // Squared norms underflow for tiny components
        let tiny = [3e-170, 4e-170];
        let axis = [1.0, 0.0];
        assert!((cosine.distance(&tiny, &axis).unwrap() - 0.4).abs() < EPS);
        assert_eq!(
            cosine.distance(&[0.0, 0.0], &[1e200, 0.0]),
            Err(VectorError::ZeroVector)
        );
    }

    #[test]
    fn test_euclidean_extreme_magnitudes() {
        let euclidean = DistanceMetric::Euclidean;
        let d = euclidean.distance(&[3e200, 0.0], &[0.0, 4e200]).unwrap();
        assert!((d / 5e200 - 1.0).abs() < EPS);
        let near = euclidean.distance(&[1e200, 1e200], &[1e200, 2e200]).unwrap();
        let far = euclidean.distance(&[1e200, 1e200], &[1e200, 3e200]).unwrap();
        assert!(near < far);

        let d = euclidean.distance(&[3e-170, 0.0], &[0.0, 4e-170]).unwrap();
        assert!((d / 5e-170 - 1.0).abs() < EPS);

        // Farther apart than f64::MAX
        assert_eq!(
            euclidean.distance(&[-1.5e308], &[1.5e308]),
            Err(VectorError::DistanceOverflow)
        );
    }

    #[test]
    fn test_norm_handles_extreme_magnitudes() {
        assert!((norm(&[3e200, 4e200]) / 5e200 - 1.0).abs() < EPS);
        assert!((norm(&[3e-170, 4e-170]) / 5e-170 - 1.0).abs() < EPS);
        assert_eq!(norm(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_metric_parsing() {
        assert_eq!("l2".parse::<DistanceMetric>().unwrap(), DistanceMetric::Euclidean);
        assert_eq!(
            "Euclidean".parse::<DistanceMetric>().unwrap(),
            DistanceMetric::Euclidean
        );
        assert_eq!("cosine".parse::<DistanceMetric>().unwrap(), DistanceMetric::Cosine);
        assert!(matches!(
            "manhattan".parse::<DistanceMetric>(),
            Err(VectorError::InvalidParameter { name: "metric", .. })
        ));
    }
}
