//! Output tables assembled from decode outcomes.
//!
//! Two shapes match the two pipeline modes: fresh clip/episode tables whose
//! rows pair an identity key with its decode outcome, and an augmented
//! metadata table whose audio columns are written back by original row
//! index. Waveforms stay native `Vec<f32>` in memory; [`encode_f32_le`] /
//! [`decode_f32_le`] define the stable portable encoding for callers that
//! need one homogeneous column type.

use std::path::{Path, PathBuf};

use base64::Engine;
use thiserror::Error;

use crate::decode::Waveform;
use crate::metadata::{CLIP_COLUMN, ClipKey, EPISODE_COLUMN, MetadataTable, SHOW_COLUMN};

/// Contracted column name for clip-table audio.
pub const AUDIO_COLUMN: &str = "AudioData";
/// Contracted column name for clip-table sample rate.
pub const RATE_COLUMN: &str = "SamplingRate";
/// Contracted column name for augmented audio.
pub const CLIPS_AUDIO_COLUMN: &str = "ClipsAudioData";
/// Contracted column name for augmented sample rate.
pub const CLIPS_RATE_COLUMN: &str = "ClipsSamplingRate";

/// One clip-level output row: identity fields plus decode outcome. Audio
/// fields are `None` when the file was missing or failed to decode.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipRow {
    pub show: String,
    pub ep_id: i64,
    pub clip_id: i64,
    pub audio: Option<Vec<f32>>,
    pub sample_rate: Option<u32>,
}

impl ClipRow {
    pub fn key(&self) -> ClipKey {
        ClipKey {
            show: self.show.clone(),
            ep_id: self.ep_id,
            clip_id: self.clip_id,
        }
    }
}

/// Clip-level output table. Row order is not part of the contract (results
/// surface as workers complete); use [`ClipTable::sort_rows`] when a stable
/// order is needed downstream.
#[derive(Debug, Clone, Default)]
pub struct ClipTable {
    pub rows: Vec<ClipRow>,
}

impl ClipTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First row matching a clip key.
    pub fn find(&self, key: &ClipKey) -> Option<&ClipRow> {
        self.rows.iter().find(|row| {
            row.show == key.show && row.ep_id == key.ep_id && row.clip_id == key.clip_id
        })
    }

    /// Rows whose audio decoded.
    pub fn loaded_count(&self) -> usize {
        self.rows.iter().filter(|row| row.audio.is_some()).count()
    }

    /// Explicit post-processing step for callers that need input-order
    /// stability: sorts by `(show, ep_id, clip_id)`.
    pub fn sort_rows(&mut self) {
        self.rows
            .sort_by(|a, b| a.key().cmp(&b.key()));
    }
}

/// One episode-level output row.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRow {
    pub show: String,
    pub ep_id: i64,
    pub audio: Option<Vec<f32>>,
    pub sample_rate: Option<u32>,
}

/// Episode-level output table, one row per unique `(show, ep_id)`.
#[derive(Debug, Clone, Default)]
pub struct EpisodeTable {
    pub rows: Vec<EpisodeRow>,
}

impl EpisodeTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn loaded_count(&self) -> usize {
        self.rows.iter().filter(|row| row.audio.is_some()).count()
    }
}

/// Metadata table augmented in place with decoded audio columns.
///
/// The two columns are parallel to `metadata.records`: slot `i` belongs to
/// input row `i`, always. A failed decode leaves both slots `None` and the
/// rest of the row untouched.
#[derive(Debug, Clone)]
pub struct AugmentedTable {
    pub metadata: MetadataTable,
    pub clips_audio: Vec<Option<Vec<f32>>>,
    pub clips_sample_rate: Vec<Option<u32>>,
}

impl AugmentedTable {
    /// Wrap a metadata table with empty audio columns sized to its rows.
    pub fn new(metadata: MetadataTable) -> Self {
        let rows = metadata.len();
        Self {
            metadata,
            clips_audio: vec![None; rows],
            clips_sample_rate: vec![None; rows],
        }
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Write one decode outcome into the columns at its input row index.
    pub fn set_outcome(&mut self, index: usize, outcome: Option<Waveform>) {
        match outcome {
            Some(waveform) => {
                self.clips_sample_rate[index] = Some(waveform.sample_rate);
                self.clips_audio[index] = Some(waveform.samples);
            }
            None => {
                self.clips_audio[index] = None;
                self.clips_sample_rate[index] = None;
            }
        }
    }

    pub fn loaded_count(&self) -> usize {
        self.clips_audio.iter().filter(|slot| slot.is_some()).count()
    }
}

/// A stored waveform blob whose length is not a whole number of `f32`s.
#[derive(Debug, Error)]
#[error("Waveform blob length {len} is not a multiple of 4 bytes")]
pub struct BlobLengthError {
    pub len: usize,
}

/// Failed to write a table export.
#[derive(Debug, Error)]
#[error("Failed to write table {path}: {source}")]
pub struct ExportError {
    pub path: PathBuf,
    pub source: csv::Error,
}

/// A table cell that does not decode back into a waveform.
#[derive(Debug, Error)]
pub enum AudioCellError {
    /// The cell is not valid base64.
    #[error("Invalid base64 in audio cell: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The decoded blob has a truncated length.
    #[error(transparent)]
    Length(#[from] BlobLengthError),
}

/// Encode a waveform for one CSV cell: base64 over the little-endian
/// `f32` blob. This is the documented stable encoding for exports that
/// need a single homogeneous column type.
pub fn encode_audio_cell(samples: &[f32]) -> String {
    base64::engine::general_purpose::STANDARD.encode(encode_f32_le(samples))
}

/// Decode a CSV cell written by [`encode_audio_cell`].
pub fn decode_audio_cell(cell: &str) -> Result<Vec<f32>, AudioCellError> {
    let blob = base64::engine::general_purpose::STANDARD.decode(cell)?;
    Ok(decode_f32_le(&blob)?)
}

/// Write a clip table as CSV with the contracted columns
/// `Show, EpId, ClipId, AudioData, SamplingRate`. Rows whose decode failed
/// leave both audio cells empty.
pub fn write_clip_csv(table: &ClipTable, path: &Path) -> Result<(), ExportError> {
    let map_err = |source| ExportError {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(map_err)?;
    writer
        .write_record([
            SHOW_COLUMN,
            EPISODE_COLUMN,
            CLIP_COLUMN,
            AUDIO_COLUMN,
            RATE_COLUMN,
        ])
        .map_err(map_err)?;
    for row in &table.rows {
        writer
            .write_record([
                row.show.clone(),
                row.ep_id.to_string(),
                row.clip_id.to_string(),
                row.audio.as_deref().map(encode_audio_cell).unwrap_or_default(),
                row.sample_rate.map(|rate| rate.to_string()).unwrap_or_default(),
            ])
            .map_err(map_err)?;
    }
    writer.flush().map_err(|source| map_err(source.into()))
}

/// Write an augmented table as CSV: the identity and passthrough columns
/// followed by `ClipsAudioData` and `ClipsSamplingRate`. The `ClipId` cell
/// is empty for episode-level rows.
pub fn write_augmented_csv(table: &AugmentedTable, path: &Path) -> Result<(), ExportError> {
    let map_err = |source| ExportError {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(map_err)?;
    let mut header = vec![
        SHOW_COLUMN.to_string(),
        EPISODE_COLUMN.to_string(),
        CLIP_COLUMN.to_string(),
    ];
    header.extend(table.metadata.label_columns.iter().cloned());
    header.push(CLIPS_AUDIO_COLUMN.to_string());
    header.push(CLIPS_RATE_COLUMN.to_string());
    writer.write_record(&header).map_err(map_err)?;

    for (row_index, record) in table.metadata.records.iter().enumerate() {
        let mut row = vec![
            record.show.clone(),
            record.ep_id.to_string(),
            record
                .clip_id
                .map(|clip_id| clip_id.to_string())
                .unwrap_or_default(),
        ];
        row.extend(record.labels.iter().cloned());
        row.push(
            table.clips_audio[row_index]
                .as_deref()
                .map(encode_audio_cell)
                .unwrap_or_default(),
        );
        row.push(
            table.clips_sample_rate[row_index]
                .map(|rate| rate.to_string())
                .unwrap_or_default(),
        );
        writer.write_record(&row).map_err(map_err)?;
    }
    writer.flush().map_err(|source| map_err(source.into()))
}

/// Encode samples as a little-endian `f32` blob.
pub fn encode_f32_le(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 4);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

/// Decode a little-endian `f32` blob back into samples.
pub fn decode_f32_le(bytes: &[u8]) -> Result<Vec<f32>, BlobLengthError> {
    if bytes.len() % 4 != 0 {
        return Err(BlobLengthError { len: bytes.len() });
    }
    let mut out = Vec::with_capacity(bytes.len() / 4);
    for chunk in bytes.chunks_exact(4) {
        out.push(f32::from_le_bytes(chunk.try_into().expect("chunk size verified")));
    }
    Ok(out)
}
