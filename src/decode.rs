//! Whole-file audio decoding.
//!
//! Decodes one audio file into interleaved `f32` samples at the file's
//! native sample rate. Every failure mode is a [`DecodeError`] value; a
//! batch run treats those as per-record misses, never as aborts.

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

/// Decoded audio in interleaved `f32` samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Waveform {
    /// Downmix to mono by averaging channels per frame.
    pub fn mono(&self) -> Vec<f32> {
        let channels = self.channels.max(1) as usize;
        if channels == 1 {
            return self.samples.clone();
        }
        self.samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    }

    /// Collapse to a single averaged channel, keeping the native rate.
    pub fn into_mono(self) -> Waveform {
        if self.channels <= 1 {
            return self;
        }
        Waveform {
            samples: self.mono(),
            sample_rate: self.sample_rate,
            channels: 1,
        }
    }
}

/// Why one file failed to decode. Carries the offending path so batch
/// reporting can name it.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The expected file is absent from disk.
    #[error("Audio file not found: {path}")]
    NotFound { path: PathBuf },
    /// The file exists but could not be opened.
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The container or codec is unsupported or the data is corrupt.
    #[error("Unsupported or corrupt audio in {path}: {source}")]
    Format {
        path: PathBuf,
        source: SymphoniaError,
    },
    /// The container holds no decodable audio track.
    #[error("No decodable audio track in {path}")]
    NoTrack { path: PathBuf },
    /// The track does not declare a sample rate.
    #[error("Missing sample rate in {path}")]
    MissingSampleRate { path: PathBuf },
    /// The track does not declare a channel layout.
    #[error("Missing channel count in {path}")]
    MissingChannelCount { path: PathBuf },
    /// Decoding succeeded but produced no samples.
    #[error("Decoded zero samples from {path}")]
    Empty { path: PathBuf },
}

impl DecodeError {
    /// The path this failure is about.
    pub fn path(&self) -> &Path {
        match self {
            DecodeError::NotFound { path }
            | DecodeError::Open { path, .. }
            | DecodeError::Format { path, .. }
            | DecodeError::NoTrack { path }
            | DecodeError::MissingSampleRate { path }
            | DecodeError::MissingChannelCount { path }
            | DecodeError::Empty { path } => path,
        }
    }
}

/// Decode a whole file at its native sample rate.
pub fn decode_file(path: &Path) -> Result<Waveform, DecodeError> {
    let file = File::open(path).map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            DecodeError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            DecodeError::Open {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|source| DecodeError::Format {
            path: path.to_path_buf(),
            source,
        })?;
    let mut format = probed.format;
    let track = format.default_track().ok_or_else(|| DecodeError::NoTrack {
        path: path.to_path_buf(),
    })?;
    let codec_params = &track.codec_params;
    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| DecodeError::MissingSampleRate {
            path: path.to_path_buf(),
        })?;
    let channels = codec_params
        .channels
        .ok_or_else(|| DecodeError::MissingChannelCount {
            path: path.to_path_buf(),
        })?
        .count() as u16;

    let mut decoder = symphonia::default::get_codecs()
        .make(codec_params, &DecoderOptions::default())
        .map_err(|source| DecodeError::Format {
            path: path.to_path_buf(),
            source,
        })?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // End of stream surfaces as an IO error from the reader.
            Err(SymphoniaError::IoError(_)) => break,
            Err(source) => {
                return Err(DecodeError::Format {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let audio_buf = match decoder.decode(&packet) {
            Ok(audio_buf) => audio_buf,
            // A malformed packet is skippable; the rest of the file may decode.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(source) => {
                return Err(DecodeError::Format {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let spec = *audio_buf.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(audio_buf.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(audio_buf);
        samples.extend_from_slice(sample_buf.samples());
    }

    if samples.is_empty() {
        return Err(DecodeError::Empty {
            path: path.to_path_buf(),
        });
    }

    Ok(Waveform {
        samples,
        sample_rate,
        channels,
    })
}
