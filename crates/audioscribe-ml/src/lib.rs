//! ML inference crate for AudioScribe
//!
//! Provides device resolution, Whisper transcription, timestamp
//! alignment, speaker diarization and the speaker merge, plus the
//! process-wide model cache.

pub mod align;
pub mod device;
pub mod diarize;
pub mod loader;
pub mod merge;
pub mod whisper;

pub use align::{refine_timestamps, AlignError};
pub use device::{
    resolve_device, resolve_with, Backend, BackendProbe, EngineSupport, Precision, ResolvedDevice,
};
pub use diarize::{Diarizer, DiarizerConfig};
pub use loader::{ModelBundle, ModelCache, ModelError};
pub use merge::assign_speakers;
pub use whisper::{TranscriptionOutput, WhisperEngine};
