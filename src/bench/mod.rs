//! Benchmarking of search strategies: latency, peak memory and recall.

mod harness;
mod memory;
mod stats;

pub use harness::{BenchmarkConfig, BenchmarkHarness, BenchmarkRecord, BenchmarkReport};
pub use memory::{AllocationTracker, MemoryProbe, NoopProbe, ProcessMemory, default_probe};
pub use stats::{Summary, mean_recall, recall_at_k};
