//! Input/output collaborators around the search core: JSON vector files,
//! synthetic data and process exit codes.

pub mod dataset;
pub mod exit_code;
pub mod generate;

use std::path::PathBuf;

use thiserror::Error;

use crate::vector::VectorError;

pub use dataset::{load_queries, load_records, load_store, save_records};
pub use exit_code::ExitCode;
pub use generate::{generate_clustered, generate_uniform};

/// Failures reading or writing vector files.
#[derive(Error, Debug)]
pub enum IoError {
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(
        "Invalid JSON in '{path}': {source}. Expected an array of {{\"id\": ..., \"vector\": [...]}} objects"
    )]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Records in '{path}' were rejected: {source}")]
    Rejected {
        path: PathBuf,
        source: VectorError,
    },
}

impl IoError {
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::Read { .. } => "FILE_READ_ERROR",
            Self::Write { .. } => "FILE_WRITE_ERROR",
            Self::Json { .. } => "JSON_ERROR",
            Self::Rejected { .. } => "RECORDS_REJECTED",
        }
    }
}
