//! Top-level error type for the vecprobe binary and library entry points.
//!
//! Each module keeps its own typed error (`VectorError`, `IoError`,
//! `ConfigError`); `AppError` unifies them for the CLI so every failure maps
//! to a stable status code, recovery suggestions and an exit code.

use thiserror::Error;

use crate::config::ConfigError;
use crate::io::IoError;
use crate::vector::VectorError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Vector(#[from] VectorError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to write output: {0}")]
    Output(#[source] std::io::Error),
}

impl AppError {
    /// Get a stable status code for this error type.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::Vector(e) => e.status_code(),
            Self::Io(e) => e.status_code(),
            Self::Config(_) => "CONFIG_ERROR",
            Self::Output(_) => "OUTPUT_ERROR",
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Vector(VectorError::IndexNotBuilt { .. } | VectorError::IndexStale { .. }) => {
                vec!["Rebuild the index with the current records before querying it"]
            }
            Self::Vector(VectorError::InsufficientData { .. }) => vec![
                "Lower --clusters (index.num_clusters) below the record count",
                "Generate or load more records",
            ],
            Self::Vector(VectorError::DimensionMismatch { .. }) => vec![
                "Check that the query file was generated with the same --dimension as the records",
            ],
            Self::Vector(VectorError::ZeroVector) => vec![
                "Use --metric euclidean, or remove all-zero vectors from the input",
            ],
            Self::Vector(VectorError::DistanceOverflow) => vec![
                "Scale the records and queries down so their distances fit in an f64",
            ],
            Self::Io(IoError::Read { .. }) => vec![
                "Check that the file exists and you have read permissions",
                "Create one with 'vecprobe generate'",
            ],
            Self::Io(IoError::Json { .. }) => vec![
                "Files must hold a JSON array of {\"id\": ..., \"vector\": [...]} objects",
            ],
            Self::Config(_) => vec![
                "Inspect the effective settings with 'vecprobe config'",
                "Check VECPROBE_* environment variables for typos",
            ],
            _ => vec![],
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
