//! Metadata table loading.
//!
//! Reads the delimited label table that describes every expected audio clip
//! and validates it once, up front, into typed records. Anything wrong with
//! the table itself (missing file, missing required column, unparsable id)
//! is fatal here, before any file loading starts; per-clip problems are left
//! to the decode stage.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Required column holding the show identifier.
pub const SHOW_COLUMN: &str = "Show";
/// Required column holding the episode id.
pub const EPISODE_COLUMN: &str = "EpId";
/// Optional column holding the clip id; absent for episode-level tables.
pub const CLIP_COLUMN: &str = "ClipId";

/// Errors raised while loading the metadata table. All of them abort the
/// run before any worker starts.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// Failed to open or read the table file.
    #[error("Failed to read metadata table {path}: {source}")]
    Read {
        path: PathBuf,
        source: csv::Error,
    },
    /// A required column is not present in the header row.
    #[error("Metadata table {path} is missing required column {column:?}")]
    MissingColumn {
        path: PathBuf,
        column: &'static str,
    },
    /// A required cell failed to parse as an integer id.
    #[error("Metadata table {path} row {row}: invalid {column} value {value:?}")]
    InvalidCell {
        path: PathBuf,
        row: usize,
        column: &'static str,
        value: String,
    },
}

/// Identity key of one clip-level record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipKey {
    pub show: String,
    pub ep_id: i64,
    pub clip_id: i64,
}

impl std::fmt::Display for ClipKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}_{}", self.show, self.ep_id, self.clip_id)
    }
}

/// One metadata row. Identity fields are typed; every other column passes
/// through untouched in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRecord {
    pub show: String,
    pub ep_id: i64,
    pub clip_id: Option<i64>,
    /// Values of the passthrough columns, aligned with
    /// [`MetadataTable::label_columns`].
    pub labels: Vec<String>,
}

impl MetadataRecord {
    /// Clip identity key, when this row carries a clip id.
    pub fn clip_key(&self) -> Option<ClipKey> {
        self.clip_id.map(|clip_id| ClipKey {
            show: self.show.clone(),
            ep_id: self.ep_id,
            clip_id,
        })
    }
}

/// Fully loaded metadata table, read-only for the duration of a run.
#[derive(Debug, Clone)]
pub struct MetadataTable {
    /// Header names of the passthrough columns, in input order.
    pub label_columns: Vec<String>,
    pub records: Vec<MetadataRecord>,
}

impl MetadataTable {
    /// Load and validate a delimited metadata table.
    pub fn load(path: &Path) -> Result<MetadataTable, MetadataError> {
        let mut reader = csv::ReaderBuilder::new()
            .from_path(path)
            .map_err(|source| MetadataError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let headers = reader
            .headers()
            .map_err(|source| MetadataError::Read {
                path: path.to_path_buf(),
                source,
            })?
            .clone();
        let show_idx = require_column(path, &headers, SHOW_COLUMN)?;
        let ep_idx = require_column(path, &headers, EPISODE_COLUMN)?;
        let clip_idx = headers.iter().position(|name| name == CLIP_COLUMN);

        let identity: Vec<usize> = [Some(show_idx), Some(ep_idx), clip_idx]
            .into_iter()
            .flatten()
            .collect();
        let label_columns: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|(idx, _)| !identity.contains(idx))
            .map(|(_, name)| name.to_string())
            .collect();

        let mut records = Vec::new();
        for (row_idx, row) in reader.records().enumerate() {
            let row = row.map_err(|source| MetadataError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let row_number = row_idx + 1;
            let show = row.get(show_idx).unwrap_or_default().to_string();
            let ep_id = parse_id(path, row_number, EPISODE_COLUMN, row.get(ep_idx))?;
            let clip_id = match clip_idx.and_then(|idx| row.get(idx)) {
                None => None,
                Some(value) if value.trim().is_empty() => None,
                Some(value) => Some(parse_id(path, row_number, CLIP_COLUMN, Some(value))?),
            };
            let labels = row
                .iter()
                .enumerate()
                .filter(|(idx, _)| !identity.contains(idx))
                .map(|(_, value)| value.to_string())
                .collect();
            records.push(MetadataRecord {
                show,
                ep_id,
                clip_id,
                labels,
            });
        }

        Ok(MetadataTable {
            label_columns,
            records,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Unique `(show, ep_id)` pairs in first-seen order.
    pub fn unique_episodes(&self) -> Vec<(String, i64)> {
        let mut seen = HashSet::new();
        let mut episodes = Vec::new();
        for record in &self.records {
            let pair = (record.show.clone(), record.ep_id);
            if seen.insert(pair.clone()) {
                episodes.push(pair);
            }
        }
        episodes
    }
}

fn require_column(
    path: &Path,
    headers: &csv::StringRecord,
    column: &'static str,
) -> Result<usize, MetadataError> {
    headers
        .iter()
        .position(|name| name == column)
        .ok_or_else(|| MetadataError::MissingColumn {
            path: path.to_path_buf(),
            column,
        })
}

fn parse_id(
    path: &Path,
    row: usize,
    column: &'static str,
    value: Option<&str>,
) -> Result<i64, MetadataError> {
    let value = value.unwrap_or_default();
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| MetadataError::InvalidCell {
            path: path.to_path_buf(),
            row,
            column,
            value: value.to_string(),
        })
}
