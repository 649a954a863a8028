//! Static time-series rendering for one clip.
//!
//! Writes `time_series_plot_<show>_<ep>_<clip>.png` into an output
//! directory, or reports that no clip matched without writing anything.
//! Wide waveforms are binned per pixel column with min/max extents.

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use thiserror::Error;

use crate::metadata::ClipKey;
use crate::table::ClipTable;

const PLOT_WIDTH: u32 = 1000;
const PLOT_HEIGHT: u32 = 400;
const BACKGROUND: Rgb<u8> = Rgb([250, 246, 240]);
const FOREGROUND: Rgb<u8> = Rgb([18, 16, 14]);

/// Why a plot could not be produced.
#[derive(Debug, Error)]
pub enum PlotError {
    /// No table row matches the requested key; nothing is written.
    #[error("No audio clip found for Show: {show}, EpId: {ep_id}, ClipId: {clip_id}")]
    ClipNotFound {
        show: String,
        ep_id: i64,
        clip_id: i64,
    },
    /// The row exists but its decode failed, so there is nothing to draw.
    #[error("Clip {key} has no decoded audio to plot")]
    NoAudio { key: ClipKey },
    /// The output directory could not be created.
    #[error("Failed to create plot directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The PNG could not be written.
    #[error("Failed to write plot {path}: {source}")]
    Write {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// File name contracted for a clip plot.
pub fn plot_file_name(key: &ClipKey) -> String {
    format!(
        "time_series_plot_{}_{}_{}.png",
        key.show, key.ep_id, key.clip_id
    )
}

/// Render the waveform of the clip matching `key` and write it under
/// `out_dir`. Returns the written path.
pub fn save_time_series_png(
    table: &ClipTable,
    out_dir: &Path,
    key: &ClipKey,
) -> Result<PathBuf, PlotError> {
    let row = table.find(key).ok_or_else(|| PlotError::ClipNotFound {
        show: key.show.clone(),
        ep_id: key.ep_id,
        clip_id: key.clip_id,
    })?;
    let samples = row
        .audio
        .as_deref()
        .ok_or_else(|| PlotError::NoAudio { key: key.clone() })?;

    let image = render_waveform(samples, PLOT_WIDTH, PLOT_HEIGHT);
    std::fs::create_dir_all(out_dir).map_err(|source| PlotError::CreateDir {
        path: out_dir.to_path_buf(),
        source,
    })?;
    let path = out_dir.join(plot_file_name(key));
    image.save(&path).map_err(|source| PlotError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Paint min/max amplitude extents per pixel column.
fn render_waveform(samples: &[f32], width: u32, height: u32) -> RgbImage {
    let mut image = RgbImage::from_pixel(width, height, BACKGROUND);
    if samples.is_empty() {
        return image;
    }
    let peak = samples
        .iter()
        .fold(1.0_f32, |peak, sample| peak.max(sample.abs()));

    for x in 0..width {
        let Some((min, max)) = column_bounds(samples, x, width) else {
            break;
        };
        let top = amplitude_to_y(max / peak, height);
        let bottom = amplitude_to_y(min / peak, height);
        for y in top..=bottom {
            image.put_pixel(x, y, FOREGROUND);
        }
    }
    image
}

/// Min and max sample within column `x` of `width`, or `None` once the
/// columns have run past the samples.
fn column_bounds(samples: &[f32], x: u32, width: u32) -> Option<(f32, f32)> {
    let len = samples.len();
    let start = (x as usize * len) / width as usize;
    if start >= len {
        return None;
    }
    let end = (((x as usize + 1) * len) / width as usize)
        .max(start + 1)
        .min(len);
    let column = &samples[start..end];
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    for &sample in column {
        min = min.min(sample);
        max = max.max(sample);
    }
    Some((min, max))
}

/// Map an amplitude in `[-1, 1]` to a pixel row, +1 at the top.
fn amplitude_to_y(value: f32, height: u32) -> u32 {
    let clamped = value.clamp(-1.0, 1.0);
    let y = (1.0 - clamped) * 0.5 * (height - 1) as f32;
    (y.round() as u32).min(height - 1)
}
