//! Pipeline context and the batch load operations.
//!
//! One [`PipelineContext`] holds everything a run needs (the loaded
//! metadata table, the filesystem roots, and the worker cap) and is built
//! and dropped per run; there is no process-wide state. Per-record failures
//! never abort a batch: they surface as `None` audio fields in the output
//! tables. Only setup errors (bad metadata, unreadable index root) are
//! fatal, and those fire before any worker starts.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::decode::{self, Waveform};
use crate::loader;
use crate::metadata::MetadataTable;
use crate::resolve::{self, TreeIndex, WalkError};
use crate::table::{AugmentedTable, ClipRow, ClipTable, EpisodeRow, EpisodeTable};

/// Emit a progress line every this many completed records.
const PROGRESS_LOG_EVERY: usize = 1_000;

/// Everything one pipeline run needs. Metadata is read-only for the
/// duration of the run.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub metadata: MetadataTable,
    /// Root of the per-clip layout `<show>/<ep>/<show>_<ep>_<clip>.wav`.
    pub clips_root: PathBuf,
    /// Root of the per-episode layout `<show>/<ep>.wav`.
    pub originals_root: PathBuf,
    /// Root of the arbitrarily nested tree used by the augmentation mode.
    pub data_root: PathBuf,
    /// Maximum concurrently running decode workers.
    pub worker_cap: usize,
}

impl PipelineContext {
    /// Build a fresh clip-level table: one output row per metadata row that
    /// carries a clip id, audio fields `None` where the file was missing or
    /// undecodable. Row order is unspecified by contract.
    pub fn load_clip_table(&self) -> ClipTable {
        let keys: Vec<_> = self
            .metadata
            .records
            .iter()
            .filter_map(|record| record.clip_key())
            .collect();
        let skipped = self.metadata.len() - keys.len();
        if skipped > 0 {
            warn!("Skipping {skipped} metadata rows without a clip id");
        }
        info!("Loading {} clips from {}", keys.len(), self.clips_root.display());

        let mut progress = progress_logger("clips");
        let outcomes = loader::load_indexed_with_progress(
            &keys,
            self.worker_cap,
            |_, key| decode_resolved(resolve::resolve_clip(&self.clips_root, key)),
            Some(&mut progress),
        );

        let rows = keys
            .into_iter()
            .zip(outcomes)
            .map(|(key, outcome)| {
                let waveform = outcome.flatten();
                let (audio, sample_rate) = split_outcome(waveform);
                ClipRow {
                    show: key.show,
                    ep_id: key.ep_id,
                    clip_id: key.clip_id,
                    audio,
                    sample_rate,
                }
            })
            .collect();
        ClipTable { rows }
    }

    /// Build an episode-level table: one output row per unique
    /// `(show, ep_id)` pair in the metadata.
    pub fn load_episode_table(&self) -> EpisodeTable {
        let episodes = self.metadata.unique_episodes();
        info!(
            "Loading {} episodes from {}",
            episodes.len(),
            self.originals_root.display()
        );

        let mut progress = progress_logger("episodes");
        let outcomes = loader::load_indexed_with_progress(
            &episodes,
            self.worker_cap,
            |_, (show, ep_id)| {
                decode_resolved(resolve::resolve_episode(&self.originals_root, show, *ep_id))
            },
            Some(&mut progress),
        );

        let rows = episodes
            .into_iter()
            .zip(outcomes)
            .map(|((show, ep_id), outcome)| {
                let (audio, sample_rate) = split_outcome(outcome.flatten());
                EpisodeRow {
                    show,
                    ep_id,
                    audio,
                    sample_rate,
                }
            })
            .collect();
        EpisodeTable { rows }
    }

    /// Augment the metadata table in place with decoded audio columns,
    /// resolving files through a one-shot index of `data_root`. The output
    /// has exactly the input's rows, in the input's order; decode outcomes
    /// are written back by original row index.
    pub fn augment_metadata(&self) -> Result<AugmentedTable, WalkError> {
        let index = TreeIndex::build(&self.data_root)?;
        info!(
            "Indexed {} audio files under {}",
            index.len(),
            self.data_root.display()
        );

        let mut progress = progress_logger("augment");
        let outcomes = loader::load_indexed_with_progress(
            &self.metadata.records,
            self.worker_cap,
            |_, record| {
                let resolved = record.clip_key().and_then(|key| index.resolve(&key));
                decode_resolved(resolved)
            },
            Some(&mut progress),
        );

        let mut augmented = AugmentedTable::new(self.metadata.clone());
        for (row_index, outcome) in outcomes.into_iter().enumerate() {
            augmented.set_outcome(row_index, outcome.flatten());
        }
        Ok(augmented)
    }
}

/// Decode a resolved path, reporting failures without propagating them.
fn decode_resolved(resolved: Option<PathBuf>) -> Option<Waveform> {
    let path = resolved?;
    match decode::decode_file(&path) {
        // Clips are stored mono; anything wider is averaged down so the
        // output column is always one amplitude sequence per record.
        Ok(waveform) => Some(waveform.into_mono()),
        Err(err) => {
            warn!(path = %err.path().display(), "Decode failed: {err}");
            None
        }
    }
}

fn split_outcome(outcome: Option<Waveform>) -> (Option<Vec<f32>>, Option<u32>) {
    match outcome {
        Some(waveform) => {
            debug!(
                "Decoded {} samples at {} Hz",
                waveform.samples.len(),
                waveform.sample_rate
            );
            (Some(waveform.samples), Some(waveform.sample_rate))
        }
        None => (None, None),
    }
}

fn progress_logger(stage: &'static str) -> impl FnMut(usize, usize) {
    move |completed, total| {
        if completed % PROGRESS_LOG_EVERY == 0 || completed == total {
            info!("{stage}: {completed}/{total} records done");
        }
    }
}
