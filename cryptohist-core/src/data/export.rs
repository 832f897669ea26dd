//! Result table export (CSV + JSON metadata sidecar).
//!
//! Layout:
//! - `{output}`            : `date,coin,price,market_cap,volume`, nulls as empty cells
//! - `{output}.meta.json`  : row/coin counts, date span, BLAKE3 of the CSV bytes
//!
//! Writes are atomic: write to `{name}.tmp`, then rename into place. A table
//! and its sidecar are both staged before either is renamed, so a failed write
//! never leaves a new CSV next to the previous run's metadata.

use super::normalize::CoinRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Column order of the output table.
pub const CSV_HEADER: [&str; 5] = ["date", "coin", "price", "market_cap", "volume"];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("metadata serialization: {0}")]
    Meta(#[from] serde_json::Error),

    #[error("nothing to export")]
    Empty,
}

/// Metadata sidecar for a written table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMeta {
    pub rows: usize,
    pub coins: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub data_hash: String,
    pub generated_at: chrono::NaiveDateTime,
}

/// Write the table and its metadata sidecar. Replaces existing files.
pub fn write_table(path: &Path, records: &[CoinRecord]) -> Result<TableMeta, ExportError> {
    let bytes = encode_csv(records)?;

    let (first_date, last_date) = date_span(records).ok_or(ExportError::Empty)?;
    let coins: HashSet<&str> = records.iter().map(|r| r.coin.as_str()).collect();
    let meta = TableMeta {
        rows: records.len(),
        coins: coins.len(),
        first_date,
        last_date,
        data_hash: blake3::hash(&bytes).to_hex().to_string(),
        generated_at: chrono::Local::now().naive_local(),
    };

    let meta_bytes = serde_json::to_vec_pretty(&meta)?;
    let meta_file = meta_path(path);

    let csv_tmp = stage(path, &bytes)?;
    let meta_tmp = stage(&meta_file, &meta_bytes).map_err(|e| {
        let _ = fs::remove_file(&csv_tmp);
        e
    })?;

    // Old sidecar never outlives the CSV it describes.
    let _ = fs::remove_file(&meta_file);
    commit(&csv_tmp, path).map_err(|e| {
        let _ = fs::remove_file(&meta_tmp);
        e
    })?;
    commit(&meta_tmp, &meta_file)?;
    Ok(meta)
}

/// Write only the CSV table.
pub fn write_csv(path: &Path, records: &[CoinRecord]) -> Result<(), ExportError> {
    let bytes = encode_csv(records)?;
    write_atomic(path, &bytes)
}

/// Read a table previously written by [`write_csv`].
pub fn read_csv(path: &Path) -> Result<Vec<CoinRecord>, ExportError> {
    let mut reader = csv::Reader::from_path(path)?;
    reader
        .deserialize()
        .collect::<Result<Vec<CoinRecord>, csv::Error>>()
        .map_err(ExportError::from)
}

/// Read the metadata sidecar next to `path`.
pub fn read_meta(path: &Path) -> Result<TableMeta, ExportError> {
    let meta_path = meta_path(path);
    let content = fs::read(&meta_path).map_err(|source| ExportError::Io {
        path: meta_path,
        source,
    })?;
    Ok(serde_json::from_slice(&content)?)
}

/// `{path}.meta.json`
pub fn meta_path(path: &Path) -> PathBuf {
    with_suffix(path, ".meta.json")
}

fn encode_csv(records: &[CoinRecord]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer
        .into_inner()
        .map_err(|e| ExportError::Csv(csv::Error::from(e.into_error())))
}

fn date_span(records: &[CoinRecord]) -> Option<(NaiveDate, NaiveDate)> {
    let first = records.iter().map(|r| r.date).min()?;
    let last = records.iter().map(|r| r.date).max()?;
    Some((first, last))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let tmp_path = stage(path, bytes)?;
    commit(&tmp_path, path)
}

/// Write `bytes` to `{path}.tmp`, creating parent directories.
fn stage(path: &Path, bytes: &[u8]) -> Result<PathBuf, ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ExportError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let tmp_path = with_suffix(path, ".tmp");
    fs::write(&tmp_path, bytes).map_err(|source| ExportError::Io {
        path: tmp_path.clone(),
        source,
    })?;
    Ok(tmp_path)
}

fn commit(tmp_path: &Path, path: &Path) -> Result<(), ExportError> {
    fs::rename(tmp_path, path).map_err(|source| {
        let _ = fs::remove_file(tmp_path);
        ExportError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
