//! Repeated, timed query workloads over interchangeable search strategies.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::bench::memory::{MemoryProbe, default_probe};
use crate::bench::stats::{Summary, mean_recall};
use crate::vector::{SearchResult, SearchStrategy, VectorError};

/// Repetition settings for a benchmark session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BenchmarkConfig {
    /// Measured runs per strategy
    #[serde(default = "default_repetitions")]
    pub repetitions: usize,

    /// Unmeasured runs before the first sample
    #[serde(default = "default_warmup")]
    pub warmup: usize,
}

fn default_repetitions() -> usize {
    5
}

fn default_warmup() -> usize {
    1
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            repetitions: default_repetitions(),
            warmup: default_warmup(),
        }
    }
}

/// One measured pass of a query batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkRecord {
    pub strategy_name: String,
    pub elapsed: Duration,
    /// Bytes above the pre-run level; `None` when no probe could measure it
    pub peak_memory: Option<u64>,
}

/// Per-strategy aggregate over all measured runs.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub strategy_name: String,
    pub queries: usize,
    pub samples: Vec<BenchmarkRecord>,
    /// Elapsed seconds per run
    pub elapsed: Summary,
    /// Peak bytes per run, present only if every run was measured
    pub peak_memory: Option<Summary>,
    /// Mean recall against the reference strategy, when one was given
    pub recall: Option<f64>,
}

impl BenchmarkReport {
    fn from_samples(
        strategy_name: String,
        queries: usize,
        samples: Vec<BenchmarkRecord>,
    ) -> Result<Self, VectorError> {
        let seconds: Vec<f64> = samples.iter().map(|s| s.elapsed.as_secs_f64()).collect();
        let elapsed = Summary::from_samples(&seconds)
            .ok_or_else(|| VectorError::invalid_parameter("repetitions", "no runs recorded"))?;
        let peaks: Option<Vec<f64>> = samples
            .iter()
            .map(|s| s.peak_memory.map(|bytes| bytes as f64))
            .collect();
        let peak_memory = peaks.as_deref().and_then(Summary::from_samples);

        Ok(Self {
            strategy_name,
            queries,
            samples,
            elapsed,
            peak_memory,
            recall: None,
        })
    }

    /// Mean wall-clock time per query.
    pub fn mean_latency_per_query(&self) -> Duration {
        if self.queries == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.elapsed.mean / self.queries as f64)
    }
}

/// Times the same query workload against any number of strategies.
///
/// Strategies are only read; rebuilding an index between differently
/// configured strategies is left to the caller.
pub struct BenchmarkHarness {
    config: BenchmarkConfig,
    probe: Box<dyn MemoryProbe>,
}

impl BenchmarkHarness {
    /// # Errors
    /// `InvalidParameter` if `config.repetitions` is zero.
    pub fn new(config: BenchmarkConfig) -> Result<Self, VectorError> {
        validate_repetitions(config.repetitions)?;
        Ok(Self {
            config,
            probe: default_probe(),
        })
    }

    /// Replaces the memory probe chosen by [`default_probe`].
    pub fn with_probe(mut self, probe: impl MemoryProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    pub fn probe_name(&self) -> &'static str {
        self.probe.name()
    }

    pub fn run(
        &self,
        strategy: &dyn SearchStrategy,
        queries: &[Vec<f64>],
        k: usize,
    ) -> Result<BenchmarkReport, VectorError> {
        self.run_with(strategy, queries, k, self.config.repetitions)
    }

    /// Runs the full query batch `repetitions` times after the configured
    /// warmup and aggregates the samples.
    ///
    /// # Errors
    /// `InvalidParameter` for zero repetitions, or the first error any query
    /// raised.
    pub fn run_with(
        &self,
        strategy: &dyn SearchStrategy,
        queries: &[Vec<f64>],
        k: usize,
        repetitions: usize,
    ) -> Result<BenchmarkReport, VectorError> {
        validate_repetitions(repetitions)?;
        let strategy_name = strategy.name();

        for _ in 0..self.config.warmup {
            run_queries(strategy, queries, k)?;
        }

        let mut samples = Vec::with_capacity(repetitions);
        for run in 0..repetitions {
            let (elapsed, peak_memory) = self.measure(strategy, queries, k)?;
            tracing::debug!(
                strategy = %strategy_name,
                run,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                peak_memory,
                "benchmark run complete"
            );
            samples.push(BenchmarkRecord {
                strategy_name: strategy_name.clone(),
                elapsed,
                peak_memory,
            });
        }

        let report = BenchmarkReport::from_samples(strategy_name, queries.len(), samples)?;
        tracing::info!(
            strategy = %report.strategy_name,
            runs = repetitions,
            mean_ms = report.elapsed.mean * 1000.0,
            "benchmark finished"
        );
        Ok(report)
    }

    /// Benchmarks every strategy on the same queries, in order.
    ///
    /// When `reference` is given, each report also carries the mean recall
    /// of that strategy's answers against the reference answers.
    pub fn compare(
        &self,
        strategies: &[&dyn SearchStrategy],
        reference: Option<&dyn SearchStrategy>,
        queries: &[Vec<f64>],
        k: usize,
    ) -> Result<Vec<BenchmarkReport>, VectorError> {
        self.compare_with(strategies, reference, queries, k, |_| {})
    }

    /// [`compare`](Self::compare), calling `on_report` as each strategy finishes.
    pub fn compare_with(
        &self,
        strategies: &[&dyn SearchStrategy],
        reference: Option<&dyn SearchStrategy>,
        queries: &[Vec<f64>],
        k: usize,
        mut on_report: impl FnMut(&BenchmarkReport),
    ) -> Result<Vec<BenchmarkReport>, VectorError> {
        let truth = reference
            .map(|strategy| run_queries(strategy, queries, k))
            .transpose()?;

        strategies
            .iter()
            .map(|strategy| {
                let mut report = self.run(*strategy, queries, k)?;
                if let Some(truth) = &truth {
                    let answers = run_queries(*strategy, queries, k)?;
                    report.recall = Some(mean_recall(truth, &answers));
                }
                on_report(&report);
                Ok(report)
            })
            .collect()
    }

    fn measure(
        &self,
        strategy: &dyn SearchStrategy,
        queries: &[Vec<f64>],
        k: usize,
    ) -> Result<(Duration, Option<u64>), VectorError> {
        self.probe.reset();
        let start = Instant::now();
        let results = run_queries(strategy, queries, k)?;
        let elapsed = start.elapsed();
        // Results stay alive until the probe is read
        let peak = self.probe.peak();
        drop(results);
        Ok((elapsed, peak))
    }
}

impl std::fmt::Debug for BenchmarkHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenchmarkHarness")
            .field("config", &self.config)
            .field("probe", &self.probe.name())
            .finish()
    }
}

fn validate_repetitions(repetitions: usize) -> Result<(), VectorError> {
    if repetitions == 0 {
        return Err(VectorError::invalid_parameter(
            "repetitions",
            "at least one measured run is required",
        ));
    }
    Ok(())
}

/// Queries are issued one after another so each sample is a sequential
/// latency, not a rayon throughput figure.
fn run_queries(
    strategy: &dyn SearchStrategy,
    queries: &[Vec<f64>],
    k: usize,
) -> Result<Vec<SearchResult>, VectorError> {
    queries.iter().map(|query| strategy.search(query, k)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::memory::NoopProbe;
    use crate::vector::{
        DistanceMetric, ExactSearcher, IvfIndex, KMeansConfig, VectorRecord, VectorStore,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Strategy that counts how often it is queried.
    struct Counting {
        calls: AtomicUsize,
    }

    impl SearchStrategy for Counting {
        fn name(&self) -> String {
            "counting".to_string()
        }

        fn search(&self, _query: &[f64], _k: usize) -> Result<SearchResult, VectorError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(SearchResult::empty())
        }
    }

    fn harness(repetitions: usize, warmup: usize) -> BenchmarkHarness {
        BenchmarkHarness::new(BenchmarkConfig {
            repetitions,
            warmup,
        })
        .unwrap()
        .with_probe(NoopProbe)
    }

    fn store() -> VectorStore {
        let mut store = VectorStore::new();
        store
            .bulk_insert((0..64).map(|i| {
                VectorRecord::new(format!("r{i:02}"), vec![(i % 8) as f64, (i / 8) as f64])
            }))
            .unwrap();
        store
    }

    #[test]
    fn test_zero_repetitions_rejected() {
        let err = BenchmarkHarness::new(BenchmarkConfig {
            repetitions: 0,
            warmup: 0,
        })
        .unwrap_err();
        assert!(matches!(
            err,
            VectorError::InvalidParameter {
                name: "repetitions",
                ..
            }
        ));

        let strategy = Counting {
            calls: AtomicUsize::new(0),
        };
        assert!(harness(1, 0).run_with(&strategy, &[vec![0.0]], 1, 0).is_err());
        assert_eq!(strategy.calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_samples_exposed_per_run() {
        let strategy = Counting {
            calls: AtomicUsize::new(0),
        };
        let queries = vec![vec![0.0]; 3];
        let report = harness(4, 2).run(&strategy, &queries, 1).unwrap();

        assert_eq!(report.samples.len(), 4);
        assert_eq!(report.queries, 3);
        // Warmup runs plus measured runs, each over every query
        assert_eq!(strategy.calls.load(Ordering::Relaxed), (2 + 4) * 3);
        assert!(report.samples.iter().all(|s| s.strategy_name == "counting"));
        assert!(report.peak_memory.is_none());

        let seconds: Vec<f64> = report
            .samples
            .iter()
            .map(|s| s.elapsed.as_secs_f64())
            .collect();
        assert_eq!(report.elapsed, Summary::from_samples(&seconds).unwrap());
        assert!(report.elapsed.min <= report.elapsed.mean);
        assert!(report.elapsed.mean <= report.elapsed.max);
    }

    #[test]
    fn test_errors_from_strategy_propagate() {
        let store = store();
        let exact = ExactSearcher::new(&store, DistanceMetric::Euclidean);
        let result = harness(2, 0).run(&exact, &[vec![0.0, 0.0, 0.0]], 3);
        assert!(matches!(result, Err(VectorError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_compare_reports_recall() {
        let store = store();
        let exact = ExactSearcher::new(&store, DistanceMetric::Euclidean);
        let index =
            IvfIndex::build(&store, DistanceMetric::Euclidean, 4, KMeansConfig::default()).unwrap();
        let full = index.with_probe(4);
        let narrow = index.with_probe(1);
        let queries: Vec<Vec<f64>> = vec![vec![0.5, 0.5], vec![3.5, 3.5], vec![7.0, 0.0]];

        let reports = harness(2, 0)
            .compare(&[&exact, &full, &narrow], Some(&exact as &dyn SearchStrategy), &queries, 5)
            .unwrap();

        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].strategy_name, "exact (euclidean)");
        assert_eq!(reports[0].recall, Some(1.0));
        assert_eq!(reports[1].recall, Some(1.0));
        let narrow_recall = reports[2].recall.unwrap();
        assert!((0.0..=1.0).contains(&narrow_recall));
    }

    #[test]
    fn test_compare_with_reports_each_strategy_as_it_finishes() {
        let first = Counting {
            calls: AtomicUsize::new(0),
        };
        let second = Counting {
            calls: AtomicUsize::new(0),
        };
        let mut finished = Vec::new();
        let reports = harness(1, 0)
            .compare_with(&[&first, &second], None, &[vec![0.0]], 1, |report| {
                finished.push((report.strategy_name.clone(), report.samples.len()));
            })
            .unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(
            finished,
            vec![("counting".to_string(), 1), ("counting".to_string(), 1)]
        );
    }

    #[test]
    fn test_mean_latency_per_query() {
        let report = BenchmarkReport::from_samples(
            "x".to_string(),
            4,
            vec![BenchmarkRecord {
                strategy_name: "x".to_string(),
                elapsed: Duration::from_millis(8),
                peak_memory: Some(100),
            }],
        )
        .unwrap();
        let per_query = report.mean_latency_per_query().as_secs_f64();
        assert!((per_query - 0.002).abs() < 1e-9);
        assert_eq!(report.peak_memory.unwrap().mean, 100.0);
    }
}
