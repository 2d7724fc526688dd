//! Exit codes for CLI operations following Unix conventions.
//!
//! # Exit Code Semantics
//!
//! - `0`: Success
//! - `1`: General error - unspecified failure
//! - `2`: Usage error - invalid arguments or parameters (also clap's code)
//! - `3-125`: Specific recoverable errors
//! - `126-255`: Reserved by shell

use crate::error::AppError;
use crate::io::IoError;
use crate::vector::VectorError;

/// Standard exit codes for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Operation succeeded (code 0)
    Success = 0,

    /// Unspecified error occurred (code 1)
    GeneralError = 1,

    /// Invalid arguments or parameters (code 2)
    UsageError = 2,

    /// Input records were rejected (code 3)
    InvalidInput = 3,

    /// Index missing or out of date (code 4)
    IndexUnavailable = 4,

    /// File I/O error (code 5)
    IoError = 5,

    /// Configuration error (code 6)
    ConfigError = 6,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

impl ExitCode {
    /// Convert an `AppError` to the appropriate exit code.
    ///
    /// Maps specific error types to semantic exit codes that scripts
    /// can use to determine appropriate recovery actions.
    pub fn from_error(error: &AppError) -> Self {
        match error {
            AppError::Vector(e) => Self::from_vector_error(e),
            AppError::Io(IoError::Rejected { source, .. }) => Self::from_vector_error(source),
            AppError::Io(IoError::Json { .. }) => ExitCode::InvalidInput,
            AppError::Io(_) | AppError::Output(_) => ExitCode::IoError,
            AppError::Config(_) => ExitCode::ConfigError,
        }
    }

    fn from_vector_error(error: &VectorError) -> Self {
        match error {
            VectorError::InvalidParameter { .. } | VectorError::InsufficientData { .. } => {
                ExitCode::UsageError
            }
            VectorError::IndexNotBuilt { .. } | VectorError::IndexStale { .. } => {
                ExitCode::IndexUnavailable
            }
            VectorError::DimensionMismatch { .. }
            | VectorError::InvalidDimension { .. }
            | VectorError::DuplicateId(_)
            | VectorError::BatchRejected { .. }
            | VectorError::ZeroVector
            | VectorError::NonFiniteValue { .. }
            | VectorError::DistanceOverflow => ExitCode::InvalidInput,
        }
    }

    /// Check if this exit code indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }

    /// Get a human-readable description of the exit code.
    pub fn description(&self) -> &str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::UsageError => "Invalid arguments",
            ExitCode::InvalidInput => "Invalid input records",
            ExitCode::IndexUnavailable => "Index unavailable",
            ExitCode::IoError => "I/O error",
            ExitCode::ConfigError => "Configuration error",
        }
    }
}
