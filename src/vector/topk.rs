//! Bounded top-k selection shared by the exact and clustered search paths.
//!
//! A max-heap keyed by `(distance, id)` holds the k best candidates seen so
//! far, so selection is O(n log k) instead of a full sort. Both search paths
//! funnel through this type, which is what makes their orderings identical.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::vector::types::{SearchHit, SearchResult, VectorId};

#[derive(Debug, Clone)]
pub struct TopK {
    k: usize,
    heap: BinaryHeap<SearchHit>,
}

impl TopK {
    #[must_use]
    pub fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(4096)),
        }
    }

    /// Offers a candidate; it is kept only if it ranks among the best k.
    ///
    /// The id is cloned only when the candidate is actually kept.
    #[inline]
    pub fn offer(&mut self, id: &VectorId, distance: f64) {
        if self.k == 0 {
            return;
        }
        if self.heap.len() < self.k {
            self.heap.push(SearchHit::new(id.clone(), distance));
            return;
        }
        let Some(worst) = self.heap.peek() else {
            return;
        };
        let candidate_is_better = match distance.total_cmp(&worst.distance.get()) {
            Ordering::Less => true,
            Ordering::Equal => *id < worst.id,
            Ordering::Greater => false,
        };
        if candidate_is_better {
            self.heap.pop();
            self.heap.push(SearchHit::new(id.clone(), distance));
        }
    }

    /// Folds another selector's candidates into this one.
    #[must_use]
    pub fn merge(mut self, other: TopK) -> Self {
        for hit in other.heap {
            self.offer(&hit.id, hit.distance.get());
        }
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Ascending by distance, ties by ascending id.
    #[must_use]
    pub fn into_result(self) -> SearchResult {
        SearchResult::from_sorted(self.heap.into_sorted_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(result: &SearchResult) -> Vec<&str> {
        result.ids().map(VectorId::as_str).collect()
    }

    #[test]
    fn test_keeps_k_smallest() {
        let mut top = TopK::new(2);
        for (id, d) in [("a", 3.0), ("b", 1.0), ("c", 2.0), ("d", 0.5)] {
            top.offer(&VectorId::from(id), d);
        }
        let result = top.into_result();
        assert_eq!(ids(&result), vec!["d", "b"]);
    }

    #[test]
    fn test_ties_prefer_lower_id_regardless_of_arrival() {
        let mut top = TopK::new(1);
        top.offer(&VectorId::from("c"), 1.0);
        top.offer(&VectorId::from("b"), 1.0);
        top.offer(&VectorId::from("d"), 1.0);
        assert_eq!(ids(&top.into_result()), vec!["b"]);
    }

    #[test]
    fn test_k_larger_than_input() {
        let mut top = TopK::new(10);
        top.offer(&VectorId::from("x"), 2.0);
        top.offer(&VectorId::from("y"), 1.0);
        let result = top.into_result();
        assert_eq!(result.len(), 2);
        assert_eq!(ids(&result), vec!["y", "x"]);
    }

    #[test]
    fn test_merge_matches_single_pass() {
        let candidates = [
            ("a", 4.0),
            ("b", 1.0),
            ("c", 1.0),
            ("d", 0.0),
            ("e", 2.5),
            ("f", 3.0),
        ];

        let mut single = TopK::new(3);
        for (id, d) in candidates {
            single.offer(&VectorId::from(id), d);
        }

        let mut left = TopK::new(3);
        let mut right = TopK::new(3);
        for (i, (id, d)) in candidates.into_iter().enumerate() {
            if i % 2 == 0 {
                left.offer(&VectorId::from(id), d);
            } else {
                right.offer(&VectorId::from(id), d);
            }
        }

        assert_eq!(left.merge(right).into_result(), single.into_result());
    }
}
