//! vecprobe: exact and IVF nearest-neighbor search over `f64` vectors, with a
//! benchmarking harness that compares strategies on latency, peak memory and
//! recall.

pub mod bench;
pub mod config;
pub mod display;
pub mod error;
pub mod io;
pub mod vector;

// Explicit exports for better API clarity
pub use config::Settings;
pub use error::{AppError, AppResult};
pub use vector::{
    DistanceMetric, ExactSearcher, IvfIndex, SearchResult, SearchStrategy, VectorError,
    VectorRecord, VectorSearchEngine, VectorStore,
};
