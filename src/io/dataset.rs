//! JSON vector files.
//!
//! Record files are arrays of `{"id": ..., "vector": [...]}` objects. Query
//! files use the same shape; only the `vector` field is read, so a record
//! file doubles as a query file.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::Deserialize;

use crate::io::IoError;
use crate::vector::{VectorRecord, VectorStore};

#[derive(Deserialize)]
struct QueryEntry {
    vector: Vec<f64>,
}

pub fn load_records(path: &Path) -> Result<Vec<VectorRecord>, IoError> {
    read_json(path)
}

pub fn load_queries(path: &Path) -> Result<Vec<Vec<f64>>, IoError> {
    let entries: Vec<QueryEntry> = read_json(path)?;
    Ok(entries.into_iter().map(|entry| entry.vector).collect())
}

/// Loads a record file straight into a new store.
///
/// # Errors
/// Fails on unreadable or malformed files and with `IoError::Rejected` when
/// the store refuses the batch (mixed dimensions, duplicate ids).
pub fn load_store(path: &Path) -> Result<VectorStore, IoError> {
    let records = load_records(path)?;
    let mut store = VectorStore::new();
    let loaded = store
        .bulk_insert(records)
        .map_err(|source| IoError::Rejected {
            path: path.to_path_buf(),
            source,
        })?;
    tracing::info!(path = %path.display(), loaded, "loaded vector records");
    Ok(store)
}

pub fn save_records(path: &Path, records: &[VectorRecord]) -> Result<(), IoError> {
    let file = File::create(path).map_err(|source| IoError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(|source| IoError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, IoError> {
    let file = File::open(path).map_err(|source| IoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })
}
