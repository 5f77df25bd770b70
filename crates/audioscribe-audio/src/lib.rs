//! Audio decoding for AudioScribe
//!
//! Decodes input files to the 16 kHz mono f32 waveform the ML crate
//! expects. WAV goes through hound, everything else through symphonia.

mod file_io;
mod resampling;

pub use file_io::{load_audio_file, AUDIO_EXTENSIONS, WHISPER_SAMPLE_RATE};
pub use resampling::resample;

use thiserror::Error;

/// Errors raised while decoding input audio.
///
/// All of these fail the job; there is no degraded mode for an input
/// that cannot be decoded.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("unsupported audio format: .{0}")]
    UnsupportedFormat(String),

    #[error("failed to open audio file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode WAV: {0}")]
    Wav(#[from] hound::Error),

    #[error("failed to decode audio: {0}")]
    Codec(#[from] symphonia::core::errors::Error),

    #[error("audio stream is missing {0}")]
    MissingStreamInfo(&'static str),

    #[error("resampling failed: {0}")]
    Resample(String),

    #[error("audio file contains no samples")]
    Empty,
}
