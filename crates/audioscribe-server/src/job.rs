//! The transcription pipeline
//!
//! `run_job` drives one job through its stages on a blocking worker:
//! model loading, audio decode, transcription, timestamp alignment,
//! optional diarization and speaker merge, formatting, output. Stage
//! transitions report progress and check for cancellation; alignment
//! and diarization degrade to warnings instead of failing the job.
//!
//! The pipeline talks to the models through `SpeechEngines` and a
//! loader callback, so tests can drive every stage past the extension
//! check with fake engines.

use crate::progress::ProgressSink;
use crate::token_store::TokenStore;
use crate::transcript::{self, TranscriptMeta};
use audioscribe_audio::{load_audio_file, AUDIO_EXTENSIONS};
use audioscribe_ml::{
    assign_speakers, refine_timestamps, resolve_device, ModelBundle, ModelCache, ModelError,
    ResolvedDevice, TranscriptionOutput,
};
use audioscribe_types::{JobRequest, JobStage, ModelSize, SpeakerTurn, LANGUAGES};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Why a job stopped short of writing a transcript
#[derive(Debug)]
pub struct JobFailure {
    pub stage: JobStage,
    pub message: String,
}

impl JobFailure {
    fn new(stage: JobStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// Model calls the pipeline makes
pub(crate) trait SpeechEngines {
    fn transcribe(&self, samples: &[f32], language: &str) -> anyhow::Result<TranscriptionOutput>;
    fn has_diarizer(&self) -> bool;
    fn diarize(&self, samples: &[f32]) -> anyhow::Result<Vec<SpeakerTurn>>;
}

impl SpeechEngines for ModelBundle {
    fn transcribe(&self, samples: &[f32], language: &str) -> anyhow::Result<TranscriptionOutput> {
        self.whisper.transcribe(samples, language)
    }

    fn has_diarizer(&self) -> bool {
        self.diarizer.is_some()
    }

    fn diarize(&self, samples: &[f32]) -> anyhow::Result<Vec<SpeakerTurn>> {
        match &self.diarizer {
            Some(diarizer) => diarizer.diarize(samples),
            None => Ok(Vec::new()),
        }
    }
}

/// Map an ISO 639-1 code to its display name, falling back to the code
fn language_display_name(code: &str) -> String {
    LANGUAGES
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(name, _)| name.to_string())
        .unwrap_or_else(|| code.to_string())
}

fn check_cancel(cancel: &AtomicBool, stage: JobStage) -> Result<(), JobFailure> {
    if cancel.load(Ordering::SeqCst) {
        Err(JobFailure::new(stage, "cancelled by user"))
    } else {
        Ok(())
    }
}

/// Run one transcription job to completion.
///
/// Blocks for the whole pipeline; callers run it via spawn_blocking.
/// Returns the path of the written transcript.
pub fn run_job(
    req: &JobRequest,
    cache: &ModelCache,
    tokens: &TokenStore,
    default_output_dir: &Path,
    progress: &dyn ProgressSink,
    cancel: &AtomicBool,
) -> Result<PathBuf, JobFailure> {
    run_pipeline(
        req,
        tokens,
        default_output_dir,
        progress,
        cancel,
        |size, device, diarization, token| cache.get(size, device, diarization, token),
    )
}

fn run_pipeline<E, L>(
    req: &JobRequest,
    tokens: &TokenStore,
    default_output_dir: &Path,
    progress: &dyn ProgressSink,
    cancel: &AtomicBool,
    load: L,
) -> Result<PathBuf, JobFailure>
where
    E: SpeechEngines,
    L: FnOnce(ModelSize, ResolvedDevice, bool, Option<&str>) -> Result<E, ModelError>,
{
    check_cancel(cancel, JobStage::Queued)?;
    progress.report(JobStage::Queued, 0.0, "Job accepted");

    let file_name = req
        .audio_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| JobFailure::new(JobStage::LoadingAudio, "Audio path has no file name"))?;

    // Reject unsupported formats before any model work happens
    let extension = req
        .audio_path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !AUDIO_EXTENSIONS.contains(&extension.as_str()) {
        return Err(JobFailure::new(
            JobStage::LoadingAudio,
            format!(
                "Unsupported audio format '{}'. Supported: {}",
                extension,
                AUDIO_EXTENSIONS.join(", ")
            ),
        ));
    }

    // Diarization needs a token for the gated weights; without one the
    // job degrades to transcription only
    let token = tokens.load();
    let mut enable_diarization = req.enable_diarization;
    if enable_diarization && token.is_none() {
        progress.warn(
            "Diarization requested but no access token is saved; \
             continuing without speaker labels",
        );
        enable_diarization = false;
    }

    check_cancel(cancel, JobStage::LoadingModels)?;
    progress.report(
        JobStage::LoadingModels,
        0.1,
        &format!("Loading {} model", req.model_size),
    );

    let device = resolve_device();
    let engines = load(req.model_size, device, enable_diarization, token.as_deref())
        .map_err(|e| JobFailure::new(JobStage::LoadingModels, e.to_string()))?;

    check_cancel(cancel, JobStage::LoadingAudio)?;
    progress.report(JobStage::LoadingAudio, 0.2, &format!("Loading {}", file_name));

    let samples = load_audio_file(&req.audio_path)
        .map_err(|e| JobFailure::new(JobStage::LoadingAudio, e.to_string()))?;

    check_cancel(cancel, JobStage::Transcribing)?;
    progress.report(JobStage::Transcribing, 0.3, "Transcribing audio");

    let output = engines
        .transcribe(&samples, &req.language)
        .map_err(|e| JobFailure::new(JobStage::Transcribing, format!("{:#}", e)))?;

    let mut segments = output.segments;
    segments.sort_by_key(|s| s.start);

    let language_code = if req.language == "auto" {
        output.language.unwrap_or_else(|| "auto".to_string())
    } else {
        req.language.clone()
    };

    check_cancel(cancel, JobStage::Aligning)?;
    progress.report(JobStage::Aligning, 0.6, "Refining word timestamps");

    segments = match refine_timestamps(segments.clone()) {
        Ok(refined) => refined,
        Err(e) => {
            progress.warn(&format!(
                "Timestamp alignment skipped: {}; keeping original timings",
                e
            ));
            segments
        }
    };

    if engines.has_diarizer() {
        check_cancel(cancel, JobStage::Diarizing)?;
        progress.report(JobStage::Diarizing, 0.7, "Identifying speakers");

        match engines.diarize(&samples) {
            Ok(turns) => {
                check_cancel(cancel, JobStage::MergingSpeakers)?;
                progress.report(
                    JobStage::MergingSpeakers,
                    0.8,
                    "Assigning speakers to segments",
                );
                assign_speakers(&mut segments, &turns);
            }
            Err(e) => {
                progress.warn(&format!(
                    "Diarization failed: {:#}; continuing without speaker labels",
                    e
                ));
            }
        }
    }

    check_cancel(cancel, JobStage::Formatting)?;
    progress.report(JobStage::Formatting, 0.9, "Formatting transcript");

    let now = Local::now();
    let meta = TranscriptMeta {
        file_name: file_name.clone(),
        model: req.model_size.to_string(),
        language: language_display_name(&language_code),
        date: now,
    };
    let document = transcript::render(&meta, &segments);

    check_cancel(cancel, JobStage::WritingOutput)?;
    progress.report(JobStage::WritingOutput, 0.95, "Writing transcript");

    let output_dir = req
        .output_dir
        .as_deref()
        .unwrap_or(default_output_dir);
    let stem = req
        .audio_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "audio".to_string());
    let out_name = transcript::output_file_name(&stem, now);

    let path = transcript::write_transcript(output_dir, &out_name, &document)
        .map_err(|e| JobFailure::new(JobStage::WritingOutput, format!("{:#}", e)))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SharedProgress;
    use audioscribe_types::{TranscriptSegment, TranscriptWord};
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn make_request(audio_path: PathBuf) -> JobRequest {
        JobRequest {
            audio_path,
            language: "auto".to_string(),
            model_size: ModelSize::Tiny,
            enable_diarization: false,
            output_dir: None,
        }
    }

    fn make_segment(start: i64, end: i64, text: &str, with_words: bool) -> TranscriptSegment {
        let words = if with_words {
            vec![TranscriptWord {
                start,
                end,
                text: text.to_string(),
            }]
        } else {
            Vec::new()
        };
        TranscriptSegment {
            start,
            end,
            text: text.to_string(),
            speaker: None,
            words,
        }
    }

    /// Writes a short silent WAV so the decode stage has real input
    fn write_input_wav(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("input.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..16_000 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    #[derive(Default)]
    struct FakeEngines {
        segments: Vec<TranscriptSegment>,
        turns: Option<Vec<SpeakerTurn>>,
        diarize_error: bool,
    }

    impl SpeechEngines for FakeEngines {
        fn transcribe(
            &self,
            _samples: &[f32],
            _language: &str,
        ) -> anyhow::Result<TranscriptionOutput> {
            Ok(TranscriptionOutput {
                segments: self.segments.clone(),
                language: Some("en".to_string()),
            })
        }

        fn has_diarizer(&self) -> bool {
            self.turns.is_some() || self.diarize_error
        }

        fn diarize(&self, _samples: &[f32]) -> anyhow::Result<Vec<SpeakerTurn>> {
            if self.diarize_error {
                anyhow::bail!("segmentation model rejected input");
            }
            Ok(self.turns.clone().unwrap_or_default())
        }
    }

    fn run_fake(
        req: &JobRequest,
        dir: &TempDir,
        progress: &SharedProgress,
        engines: FakeEngines,
    ) -> Result<PathBuf, JobFailure> {
        let tokens = TokenStore::with_path(dir.path().join("token.txt"), None);
        let cancel = AtomicBool::new(false);
        run_pipeline(req, &tokens, dir.path(), progress, &cancel, |_, _, _, _| {
            Ok::<_, ModelError>(engines)
        })
    }

    #[test]
    fn cancelled_before_start() {
        let dir = tempdir().unwrap();
        let req = make_request(dir.path().join("a.wav"));
        let cache = ModelCache::new();
        let tokens = TokenStore::with_path(dir.path().join("token.txt"), None);
        let progress = SharedProgress::new();
        let cancel = AtomicBool::new(true);

        let err = run_job(&req, &cache, &tokens, dir.path(), &progress, &cancel).unwrap_err();
        assert_eq!(err.stage, JobStage::Queued);
        assert!(err.message.contains("cancelled"));
    }

    #[test]
    fn unsupported_extension_fails_before_model_loading() {
        let dir = tempdir().unwrap();
        let req = make_request(dir.path().join("notes.txt"));
        let cache = ModelCache::new();
        let tokens = TokenStore::with_path(dir.path().join("token.txt"), None);
        let progress = SharedProgress::new();
        let cancel = AtomicBool::new(false);

        let err = run_job(&req, &cache, &tokens, dir.path(), &progress, &cancel).unwrap_err();
        assert_eq!(err.stage, JobStage::LoadingAudio);
        assert!(err.message.contains("Unsupported audio format"));
    }

    #[test]
    fn out_of_order_segments_are_sorted_in_the_output() {
        let dir = tempdir().unwrap();
        let req = make_request(write_input_wav(&dir));
        let progress = SharedProgress::new();
        let engines = FakeEngines {
            segments: vec![
                make_segment(5000, 6000, "second sentence", true),
                make_segment(0, 1000, "first sentence", true),
            ],
            ..FakeEngines::default()
        };

        let path = run_fake(&req, &dir, &progress, engines).unwrap();
        let document = fs::read_to_string(path).unwrap();

        let first = document.find("first sentence").unwrap();
        let second = document.find("second sentence").unwrap();
        assert!(first < second);
        assert!(document.contains("[00:00:00] first sentence"));
        assert!(document.contains("[00:00:05] second sentence"));
    }

    #[test]
    fn missing_word_timings_degrade_to_a_warning() {
        let dir = tempdir().unwrap();
        let req = make_request(write_input_wav(&dir));
        let progress = SharedProgress::new();
        let engines = FakeEngines {
            segments: vec![make_segment(1000, 2000, "no word timings here", false)],
            ..FakeEngines::default()
        };

        let path = run_fake(&req, &dir, &progress, engines).unwrap();

        let snap = progress.snapshot();
        assert_eq!(snap.warnings.len(), 1);
        assert!(snap.warnings[0].contains("alignment"));

        // Original segment timing survives unrefined
        let document = fs::read_to_string(path).unwrap();
        assert!(document.contains("[00:00:01] no word timings here"));
    }

    #[test]
    fn diarization_without_token_completes_with_warning() {
        let dir = tempdir().unwrap();
        let mut req = make_request(write_input_wav(&dir));
        req.enable_diarization = true;

        let tokens = TokenStore::with_path(dir.path().join("token.txt"), None);
        let progress = SharedProgress::new();
        let cancel = AtomicBool::new(false);

        let path = run_pipeline(
            &req,
            &tokens,
            dir.path(),
            &progress,
            &cancel,
            |_, _, diarization, token| {
                // The downgrade must happen before the loader is asked
                assert!(!diarization);
                assert!(token.is_none());
                Ok::<_, ModelError>(FakeEngines {
                    segments: vec![make_segment(0, 1000, "hello", true)],
                    ..FakeEngines::default()
                })
            },
        )
        .unwrap();

        let snap = progress.snapshot();
        assert!(snap.warnings.iter().any(|w| w.contains("token")));

        let document = fs::read_to_string(path).unwrap();
        assert!(!document.contains("SPEAKER_"));
    }

    #[test]
    fn speaker_turns_label_the_output() {
        let dir = tempdir().unwrap();
        let req = make_request(write_input_wav(&dir));
        let progress = SharedProgress::new();
        let engines = FakeEngines {
            segments: vec![make_segment(0, 1000, "hello", true)],
            turns: Some(vec![SpeakerTurn {
                start: 0,
                end: 1000,
                speaker: "SPEAKER_00".to_string(),
            }]),
            ..FakeEngines::default()
        };

        let path = run_fake(&req, &dir, &progress, engines).unwrap();
        let document = fs::read_to_string(path).unwrap();
        assert!(document.contains("[00:00:00] SPEAKER_00: hello"));
    }

    #[test]
    fn diarizer_failure_degrades_to_a_warning() {
        let dir = tempdir().unwrap();
        let req = make_request(write_input_wav(&dir));
        let progress = SharedProgress::new();
        let engines = FakeEngines {
            segments: vec![make_segment(0, 1000, "hello", true)],
            diarize_error: true,
            ..FakeEngines::default()
        };

        let path = run_fake(&req, &dir, &progress, engines).unwrap();

        let snap = progress.snapshot();
        assert!(snap.warnings.iter().any(|w| w.contains("Diarization failed")));

        let document = fs::read_to_string(path).unwrap();
        assert!(!document.contains("SPEAKER_"));
    }

    #[test]
    fn language_names_resolve_from_catalog() {
        assert_eq!(language_display_name("en"), "English");
        assert_eq!(language_display_name("uk"), "Ukrainian");
        assert_eq!(language_display_name("xx"), "xx");
    }
}
