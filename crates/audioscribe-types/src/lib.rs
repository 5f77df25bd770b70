//! Shared types for AudioScribe
//!
//! This crate contains the data structures passed between the audio,
//! ML and server crates: job requests, transcript segments, speaker
//! turns, job stages and progress snapshots.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// ============================================================================
// Job Types
// ============================================================================

/// Whisper model size selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ModelSize {
    Tiny,
    Base,
    Small,
    Medium,
    LargeV2,
    LargeV3,
}

impl ModelSize {
    /// All selectable sizes, smallest first (mirrors the UI dropdown order)
    pub fn all() -> &'static [ModelSize] {
        &[
            ModelSize::Tiny,
            ModelSize::Base,
            ModelSize::Small,
            ModelSize::Medium,
            ModelSize::LargeV2,
            ModelSize::LargeV3,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::LargeV2 => "large-v2",
            ModelSize::LargeV3 => "large-v3",
        }
    }
}

impl fmt::Display for ModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tiny" => Ok(ModelSize::Tiny),
            "base" => Ok(ModelSize::Base),
            "small" => Ok(ModelSize::Small),
            "medium" => Ok(ModelSize::Medium),
            "large-v2" => Ok(ModelSize::LargeV2),
            "large-v3" => Ok(ModelSize::LargeV3),
            _ => Err(format!("Unknown model size: {}", s)),
        }
    }
}

/// One transcription run over one input file. Immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    /// Path to the input audio file on local disk
    pub audio_path: PathBuf,
    /// ISO 639-1 code, or "auto" for language auto-detection
    #[serde(default = "default_language")]
    pub language: String,
    /// Whisper model size
    #[serde(default = "default_model_size")]
    pub model_size: ModelSize,
    /// Run speaker diarization (requires a saved access token)
    #[serde(default)]
    pub enable_diarization: bool,
    /// Output directory override; the configured downloads dir when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

fn default_language() -> String {
    "auto".to_string()
}

fn default_model_size() -> ModelSize {
    ModelSize::Tiny
}

// ============================================================================
// Transcript Types
// ============================================================================

/// A segment of transcribed text with timing information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSegment {
    /// Start time in milliseconds
    pub start: i64,
    /// End time in milliseconds
    pub end: i64,
    /// Transcribed text
    pub text: String,
    /// Speaker label (e.g. "SPEAKER_00"), set by the speaker merge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    /// Word-level timestamps, used by timestamp alignment
    #[serde(default)]
    pub words: Vec<TranscriptWord>,
}

/// A single word with timing information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptWord {
    /// Start time in milliseconds
    pub start: i64,
    /// End time in milliseconds
    pub end: i64,
    /// The word text
    pub text: String,
}

/// One span attributed to a single speaker by diarization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerTurn {
    /// Start time in milliseconds
    pub start: i64,
    /// End time in milliseconds
    pub end: i64,
    /// Speaker label ("SPEAKER_00", "SPEAKER_01", ...)
    pub speaker: String,
}

// ============================================================================
// Job Lifecycle Types
// ============================================================================

/// Pipeline stage of a transcription job.
///
/// Stages advance strictly in declaration order; `Failed` is reachable
/// from any non-terminal stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Queued,
    LoadingModels,
    LoadingAudio,
    Transcribing,
    Aligning,
    Diarizing,
    MergingSpeakers,
    Formatting,
    WritingOutput,
    Done,
    Failed,
}

impl JobStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStage::Done | JobStage::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Queued => "queued",
            JobStage::LoadingModels => "loading_models",
            JobStage::LoadingAudio => "loading_audio",
            JobStage::Transcribing => "transcribing",
            JobStage::Aligning => "aligning",
            JobStage::Diarizing => "diarizing",
            JobStage::MergingSpeakers => "merging_speakers",
            JobStage::Formatting => "formatting",
            JobStage::WritingOutput => "writing_output",
            JobStage::Done => "done",
            JobStage::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last reported progress of the current job. Last write wins; the UI
/// polls this snapshot while the job runs on a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub stage: JobStage,
    /// Fractional progress in [0, 1], non-decreasing across a run
    pub fraction: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Warnings accumulated by degraded stages (alignment/diarization)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Error message when stage == Failed, prefixed with the originating stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Path of the written transcript when stage == Done
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            stage: JobStage::Queued,
            fraction: 0.0,
            message: None,
            warnings: Vec::new(),
            error: None,
            output_path: None,
        }
    }
}

// ============================================================================
// Language Catalog
// ============================================================================

/// Display-name / ISO 639-1 pairs offered by the UI. "auto" enables
/// Whisper language auto-detection.
pub const LANGUAGES: &[(&str, &str)] = &[
    ("Auto-detect", "auto"),
    ("English", "en"),
    ("Spanish", "es"),
    ("French", "fr"),
    ("German", "de"),
    ("Italian", "it"),
    ("Portuguese", "pt"),
    ("Dutch", "nl"),
    ("Polish", "pl"),
    ("Russian", "ru"),
    ("Japanese", "ja"),
    ("Chinese", "zh"),
    ("Korean", "ko"),
    ("Arabic", "ar"),
    ("Turkish", "tr"),
    ("Hindi", "hi"),
    ("Vietnamese", "vi"),
    ("Thai", "th"),
    ("Indonesian", "id"),
    ("Ukrainian", "uk"),
    ("Czech", "cs"),
];

/// Check whether a language code is in the supported catalog
pub fn is_supported_language(code: &str) -> bool {
    LANGUAGES.iter().any(|(_, c)| *c == code)
}
