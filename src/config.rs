//! Configuration module for vecprobe.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file (`vecprobe.toml` in the working directory, or `-c PATH`)
//! - Environment variable overrides
//! - CLI argument overrides (applied by the binary)
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `VECPROBE_` and use double
//! underscores to separate nested levels:
//! - `VECPROBE_INDEX__NUM_CLUSTERS=64` sets `index.num_clusters`
//! - `VECPROBE_SEARCH__METRIC=cosine` sets `search.metric`
//! - `VECPROBE_LOG_LEVEL=debug` sets `log_level`

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bench::BenchmarkConfig;
use crate::vector::{DistanceMetric, KMeansConfig};

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "vecprobe.toml";

const ENV_PREFIX: &str = "VECPROBE_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write configuration to '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Log filter used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub benchmark: BenchmarkConfig,

    #[serde(default)]
    pub generate: GenerateConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SearchConfig {
    /// Distance metric: "euclidean" (alias "l2") or "cosine"
    #[serde(default)]
    pub metric: DistanceMetric,

    /// Number of neighbors returned per query
    #[serde(default = "default_k")]
    pub k: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct IndexConfig {
    /// Number of k-means clusters (inverted lists)
    #[serde(default = "default_num_clusters")]
    pub num_clusters: usize,

    /// Clusters scanned per approximate query
    #[serde(default = "default_num_probe")]
    pub num_probe: usize,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Centroid movement below which k-means stops early
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Seed for k-means++ and training sampling
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Train on at most this many sampled vectors (all when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_sample_size: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GenerateConfig {
    #[serde(default = "default_count")]
    pub count: usize,

    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Lower bound of each component (inclusive)
    #[serde(default)]
    pub low: f64,

    /// Upper bound of each component (exclusive)
    #[serde(default = "default_high")]
    pub high: f64,
}

fn default_version() -> u32 {
    1
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_k() -> usize {
    10
}
fn default_num_clusters() -> usize {
    100
}
fn default_num_probe() -> usize {
    10
}
fn default_max_iterations() -> usize {
    KMeansConfig::default().max_iterations
}
fn default_tolerance() -> f64 {
    KMeansConfig::default().tolerance
}
fn default_seed() -> u64 {
    KMeansConfig::default().seed
}
fn default_count() -> usize {
    20_000
}
fn default_dimension() -> usize {
    512
}
fn default_high() -> f64 {
    1.0
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            log_level: default_log_level(),
            search: SearchConfig::default(),
            index: IndexConfig::default(),
            benchmark: BenchmarkConfig::default(),
            generate: GenerateConfig::default(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::default(),
            k: default_k(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            num_clusters: default_num_clusters(),
            num_probe: default_num_probe(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            seed: default_seed(),
            training_sample_size: None,
        }
    }
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            dimension: default_dimension(),
            low: 0.0,
            high: default_high(),
        }
    }
}

impl IndexConfig {
    /// Clustering parameters for index training.
    pub fn kmeans(&self) -> KMeansConfig {
        KMeansConfig {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            seed: self.seed,
            training_sample_size: self.training_sample_size,
        }
    }
}

impl Settings {
    /// Load configuration from all sources, reading `vecprobe.toml` from the
    /// working directory if it exists.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration layering `path` over the defaults, then the
    /// environment. A missing file is not an error.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::figment(path.as_ref())
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path))
            // Double underscore separates nested levels, single underscores
            // stay inside field names
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string).map_err(write_error)
    }

    /// Render the effective settings as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
