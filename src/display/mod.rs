//! Terminal display utilities for the CLI.
//!
//! Provides styled tables, progress indicators and a color theme.

pub mod progress;
pub mod tables;
pub mod theme;

pub use progress::{create_benchmark_progress, create_spinner, with_spinner};
pub use tables::{
    create_benchmark_table, create_results_table, create_samples_table, format_bytes,
    format_seconds,
};
pub use theme::{THEME, Theme};
