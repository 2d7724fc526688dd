//! Recall of the IVF index on fixed synthetic clustered data.

use vecprobe::bench::mean_recall;
use vecprobe::io::generate_clustered;
use vecprobe::vector::{
    DistanceMetric, ExactSearcher, IvfIndex, KMeansConfig, SearchStrategy, VectorStore,
};

const DIMENSION: usize = 16;
const CENTERS: usize = 20;

fn clustered_store() -> VectorStore {
    let mut store = VectorStore::new();
    store
        .bulk_insert(generate_clustered(2000, DIMENSION, CENTERS, 10.0, 0.5, 2024).unwrap())
        .unwrap();
    store
}

/// Queries are stored vectors nudged off their original position.
fn queries_near_records(store: &VectorStore, count: usize) -> Vec<Vec<f64>> {
    store
        .records()
        .iter()
        .step_by(store.size() / count)
        .take(count)
        .map(|r| r.vector.iter().map(|v| v + 0.05).collect())
        .collect()
}

#[test]
fn test_recall_with_fifth_of_clusters_probed() {
    let store = clustered_store();
    let queries = queries_near_records(&store, 50);
    let k = 10;

    let exact = ExactSearcher::new(&store, DistanceMetric::Euclidean);
    let index = IvfIndex::build(
        &store,
        DistanceMetric::Euclidean,
        CENTERS,
        KMeansConfig::default(),
    )
    .unwrap();

    let truth = exact.search_batch(&queries, k).unwrap();
    let approx = index.with_probe(CENTERS / 5).search_batch(&queries, k).unwrap();
    let recall = mean_recall(&truth, &approx);
    assert!(recall >= 0.9, "recall@{k} was {recall:.3}");
}

#[test]
fn test_recall_grows_with_probe_count() {
    let store = clustered_store();
    let queries = queries_near_records(&store, 40);
    let k = 25;

    let exact = ExactSearcher::new(&store, DistanceMetric::Euclidean);
    // More lists than natural clusters so single-probe recall is imperfect
    let index = IvfIndex::build(&store, DistanceMetric::Euclidean, 64, KMeansConfig::default())
        .unwrap();
    let truth = exact.search_batch(&queries, k).unwrap();

    let recalls: Vec<f64> = [1, 4, 16, 64]
        .into_iter()
        .map(|probe| {
            let approx = index.with_probe(probe).search_batch(&queries, k).unwrap();
            mean_recall(&truth, &approx)
        })
        .collect();

    for pair in recalls.windows(2) {
        assert!(pair[0] <= pair[1], "recall dropped: {recalls:?}");
    }
    assert_eq!(recalls[3], 1.0);
}

#[test]
fn test_training_sample_keeps_recall() {
    let store = clustered_store();
    let queries = queries_near_records(&store, 30);
    let config = KMeansConfig {
        training_sample_size: Some(400),
        ..KMeansConfig::default()
    };

    let exact = ExactSearcher::new(&store, DistanceMetric::Euclidean);
    let index = IvfIndex::build(&store, DistanceMetric::Euclidean, CENTERS, config).unwrap();
    assert_eq!(index.len(), store.size());

    let truth = exact.search_batch(&queries, 10).unwrap();
    let approx = index.with_probe(CENTERS / 4).search_batch(&queries, 10).unwrap();
    assert!(mean_recall(&truth, &approx) >= 0.9);
}
