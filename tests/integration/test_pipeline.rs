//! File-to-report flow: generate, save, load, index, benchmark, render.

use tempfile::TempDir;

use vecprobe::bench::{BenchmarkConfig, BenchmarkHarness, NoopProbe};
use vecprobe::display::{create_benchmark_table, create_results_table};
use vecprobe::io::{generate_uniform, load_queries, load_store, save_records};
use vecprobe::vector::{
    DistanceMetric, IndexStatus, KMeansConfig, SearchStrategy, VectorError, VectorSearchEngine,
};

#[test]
fn test_generate_load_search_and_benchmark() {
    let dir = TempDir::new().unwrap();
    let records_path = dir.path().join("elements.json");
    let queries_path = dir.path().join("queries.json");

    save_records(&records_path, &generate_uniform(600, 8, 0.0, 1.0, 1).unwrap()).unwrap();
    save_records(&queries_path, &generate_uniform(12, 8, 0.0, 1.0, 2).unwrap()).unwrap();

    let store = load_store(&records_path).unwrap();
    let queries = load_queries(&queries_path).unwrap();
    assert_eq!(store.size(), 600);
    assert_eq!(queries.len(), 12);

    let engine =
        VectorSearchEngine::with_store(store, DistanceMetric::Euclidean, KMeansConfig::default());
    engine.build_index(12).unwrap();
    let index = engine.index().unwrap();

    let exact = engine.exact();
    let narrow = index.with_probe(2);
    let full = index.with_probe(12);
    let harness = BenchmarkHarness::new(BenchmarkConfig {
        repetitions: 3,
        warmup: 1,
    })
    .unwrap()
    .with_probe(NoopProbe);

    let reports = harness
        .compare(
            &[&exact, &narrow, &full],
            Some(&exact as &dyn SearchStrategy),
            &queries,
            5,
        )
        .unwrap();

    assert_eq!(reports.len(), 3);
    for report in &reports {
        assert_eq!(report.samples.len(), 3);
        assert_eq!(report.queries, 12);
        assert!(report.elapsed.variance >= 0.0);
    }
    assert_eq!(reports[2].strategy_name, "ivf (euclidean, clusters=12, probe=12)");
    assert_eq!(reports[2].recall, Some(1.0));

    let table = create_benchmark_table(&reports);
    assert!(table.contains("exact (euclidean)"));
    assert!(table.contains("probe=2"));

    let results = engine.search_batch_approximate(&queries, 5, 12).unwrap();
    assert_eq!(results, engine.search_batch_exact(&queries, 5).unwrap());
    assert!(create_results_table(&results).contains("Distance"));
}

#[test]
fn test_engine_rebuild_after_mutation() {
    let records = generate_uniform(100, 4, 0.0, 1.0, 8).unwrap();
    let mut engine = VectorSearchEngine::new(DistanceMetric::Cosine, KMeansConfig::default());
    engine.bulk_insert(records.clone()).unwrap();
    engine.build_index(5).unwrap();
    assert_eq!(engine.index_status(), IndexStatus::Ready { num_clusters: 5 });

    let victim = records[17].id.clone();
    assert!(engine.remove(&victim).is_some());
    assert!(matches!(engine.index_status(), IndexStatus::Stale { .. }));
    assert!(matches!(
        engine.search_approximate(&records[17].vector, 3, 5),
        Err(VectorError::IndexStale { .. })
    ));

    engine.build_index(5).unwrap();
    let result = engine.search_approximate(&records[17].vector, 3, 5).unwrap();
    assert!(result.ids().all(|id| *id != victim));
    assert_eq!(result, engine.search_exact(&records[17].vector, 3).unwrap());

    // Empty batches leave the index fresh
    assert_eq!(engine.bulk_insert(Vec::new()).unwrap(), 0);
    assert_eq!(engine.index_status(), IndexStatus::Ready { num_clusters: 5 });
}
