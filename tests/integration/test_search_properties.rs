//! Ordering, equivalence and mutation properties of the search strategies.

use std::collections::HashSet;

use vecprobe::io::generate_uniform;
use vecprobe::vector::{
    DistanceMetric, ExactSearcher, IndexState, IvfIndex, KMeansConfig, SearchStrategy,
    VectorError, VectorRecord, VectorStore,
};

fn uniform_store(count: usize, dimension: usize, seed: u64) -> VectorStore {
    let mut store = VectorStore::new();
    store
        .bulk_insert(generate_uniform(count, dimension, 0.0, 1.0, seed).unwrap())
        .unwrap();
    store
}

fn queries(count: usize, dimension: usize, seed: u64) -> Vec<Vec<f64>> {
    generate_uniform(count, dimension, 0.0, 1.0, seed)
        .unwrap()
        .into_iter()
        .map(|r| r.vector)
        .collect()
}

#[test]
fn test_exact_results_sorted_with_id_tie_break() {
    let mut store = VectorStore::new();
    // Coarse grid so many distances tie exactly
    store
        .bulk_insert((0..200).map(|i| {
            VectorRecord::new(
                format!("g{:03}", (i * 7919) % 200),
                vec![(i % 5) as f64, (i / 5 % 4) as f64],
            )
        }))
        .unwrap();
    let exact = ExactSearcher::new(&store, DistanceMetric::Euclidean);

    for query in [[0.0, 0.0], [2.0, 1.5], [4.0, 3.0]] {
        let result = exact.search(&query, 40).unwrap();
        assert_eq!(result.len(), 40);
        for pair in result.hits().windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(a.distance <= b.distance);
            if a.distance == b.distance {
                assert!(a.id < b.id, "{} should precede {}", a.id, b.id);
            }
        }
    }
}

#[test]
fn test_full_probe_matches_exact_for_both_metrics() {
    let store = uniform_store(1500, 12, 3);
    let queries = queries(25, 12, 4);

    for metric in [DistanceMetric::Euclidean, DistanceMetric::Cosine] {
        let index = IvfIndex::build(&store, metric, 24, KMeansConfig::default()).unwrap();
        let exact = ExactSearcher::new(&store, metric);
        let full = index.with_probe(index.num_clusters());

        assert_eq!(
            full.search_batch(&queries, 10).unwrap(),
            exact.search_batch(&queries, 10).unwrap(),
            "full probe must equal exact under {metric}"
        );
        // Probe counts above the cluster count clamp to a full probe
        assert_eq!(
            index.search(&queries[0], 10, 1000).unwrap(),
            exact.search(&queries[0], 10).unwrap()
        );
    }
}

#[test]
fn test_partial_probe_only_returns_probed_members() {
    let store = uniform_store(800, 6, 11);
    let index =
        IvfIndex::build(&store, DistanceMetric::Euclidean, 16, KMeansConfig::default()).unwrap();

    for query in queries(20, 6, 12) {
        for num_probe in [1, 3, 7] {
            let probed: HashSet<_> = index.probe(&query, num_probe).unwrap().into_iter().collect();
            assert_eq!(probed.len(), num_probe);
            let result = index.search(&query, 15, num_probe).unwrap();
            for id in result.ids() {
                let cluster = index.cluster_of(id).unwrap();
                assert!(probed.contains(&cluster), "{id} is outside the probed clusters");
            }
        }
    }
}

#[test]
fn test_every_record_in_exactly_one_cluster() {
    let store = uniform_store(500, 4, 21);
    let index =
        IvfIndex::build(&store, DistanceMetric::Euclidean, 10, KMeansConfig::default()).unwrap();

    let total: usize = index.clusters().iter().map(|c| c.len()).sum();
    assert_eq!(total, store.size());
    let mut seen = HashSet::new();
    for cluster in index.clusters() {
        for id in cluster.members() {
            assert!(seen.insert(id.clone()), "{id} assigned twice");
        }
    }
    assert_eq!(seen.len(), store.size());
}

#[test]
fn test_dimension_violation_never_mutates_store() {
    let mut store = uniform_store(50, 3, 5);
    let before: Vec<VectorRecord> = store.get_all().cloned().collect();
    let generation = store.generation();

    for bad in [vec![1.0], vec![1.0, 2.0, 3.0, 4.0]] {
        assert!(matches!(
            store.insert("intruder", bad.clone()),
            Err(VectorError::DimensionMismatch { expected: 3, .. })
        ));
        let err = store
            .bulk_insert(vec![
                VectorRecord::new("ok", vec![0.1, 0.2, 0.3]),
                VectorRecord::new("bad", bad),
            ])
            .unwrap_err();
        match err {
            VectorError::BatchRejected { failures } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    let after: Vec<VectorRecord> = store.get_all().cloned().collect();
    assert_eq!(before, after);
    assert_eq!(store.generation(), generation);
}

#[test]
fn test_bulk_insert_round_trips_through_get_all() {
    let records = generate_uniform(300, 5, -1.0, 1.0, 77).unwrap();
    let mut store = VectorStore::new();
    assert_eq!(store.bulk_insert(records.clone()).unwrap(), 300);

    let expected: HashSet<String> = records
        .iter()
        .map(|r| format!("{}:{:?}", r.id, r.vector))
        .collect();
    let enumerated: HashSet<String> = store
        .get_all()
        .map(|r| format!("{}:{:?}", r.id, r.vector))
        .collect();
    assert_eq!(enumerated, expected);

    // The sequence is restartable
    assert_eq!(store.get_all().count(), store.get_all().count());
}

#[test]
fn test_two_tight_pairs_scenario() {
    let mut store = VectorStore::new();
    store
        .bulk_insert(vec![
            VectorRecord::new("a1", vec![0.0, 0.0]),
            VectorRecord::new("a2", vec![0.1, 0.0]),
            VectorRecord::new("b1", vec![9.0, 9.0]),
            VectorRecord::new("b2", vec![9.0, 9.1]),
        ])
        .unwrap();

    let mut index = IvfIndex::new(DistanceMetric::Euclidean, KMeansConfig::default());
    assert_eq!(index.state(), IndexState::Untrained);
    index.train(&store, 2).unwrap();
    assert_eq!(index.state(), IndexState::Trained);
    index.populate(&store).unwrap();
    assert_eq!(index.state(), IndexState::Populated);
    index.finalize().unwrap();
    assert_eq!(index.state(), IndexState::Ready);

    let a = index.cluster_of(&"a1".into()).unwrap();
    assert_eq!(index.cluster_of(&"a2".into()), Some(a));
    let b = index.cluster_of(&"b1".into()).unwrap();
    assert_eq!(index.cluster_of(&"b2".into()), Some(b));
    assert_ne!(a, b);

    let result = index.search(&[8.8, 9.2], 4, 1).unwrap();
    let ids: Vec<&str> = result.ids().map(|id| id.as_str()).collect();
    assert_eq!(ids, vec!["b2", "b1"]);
}

#[test]
fn test_error_conditions_are_typed() {
    let store = uniform_store(10, 3, 1);
    let index = IvfIndex::new(DistanceMetric::Euclidean, KMeansConfig::default());
    assert!(matches!(
        index.search(&[0.0; 3], 1, 1),
        Err(VectorError::IndexNotBuilt {
            state: IndexState::Untrained
        })
    ));

    let ready =
        IvfIndex::build(&store, DistanceMetric::Euclidean, 2, KMeansConfig::default()).unwrap();
    assert!(matches!(
        ready.search(&[0.0; 3], 1, 0),
        Err(VectorError::InvalidParameter {
            name: "num_probe",
            ..
        })
    ));
    assert!(matches!(
        IvfIndex::build(&store, DistanceMetric::Euclidean, 11, KMeansConfig::default()),
        Err(VectorError::InsufficientData {
            required: 11,
            available: 10
        })
    ));
    assert!(matches!(
        IvfIndex::build(&store, DistanceMetric::Euclidean, 0, KMeansConfig::default()),
        Err(VectorError::InvalidParameter {
            name: "num_clusters",
            ..
        })
    ));

    let empty = VectorStore::new();
    let exact = ExactSearcher::new(&empty, DistanceMetric::Euclidean);
    assert!(exact.search(&[1.0, 2.0], 5).unwrap().is_empty());
}
