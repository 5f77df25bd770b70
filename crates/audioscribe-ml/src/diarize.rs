//! Speaker diarization using an ONNX segmentation model
//!
//! Runs the pyannote speaker-segmentation model over fixed 10 second
//! windows. The model emits per-frame log-probabilities over powerset
//! classes (silence, each single speaker, each speaker pair); argmax
//! decoding turns those into per-speaker activity tracks, which are
//! then stitched into ordered speaker turns.
//!
//! Local speaker slots are mapped to stable labels by slot index
//! (SPEAKER_00, SPEAKER_01, ...). Without an embedding model there is
//! no cross-window clustering; labels may fragment on long files,
//! which is acceptable for a local transcription utility.

use anyhow::{Context, Result};
use audioscribe_types::SpeakerTurn;
use ort::session::{builder::GraphOptimizationLevel, Session};
use parking_lot::Mutex;
use std::path::Path;

/// Local speaker slots per window (fixed by the segmentation model)
const NUM_SPEAKERS: usize = 3;

/// Powerset class -> active speaker slots
const POWERSET: [&[usize]; 7] = [&[], &[0], &[1], &[2], &[0, 1], &[0, 2], &[1, 2]];

/// Diarization configuration
#[derive(Debug, Clone)]
pub struct DiarizerConfig {
    /// Analysis window in seconds
    pub window_secs: f32,
    /// Input sample rate
    pub sample_rate: u32,
    /// Turns shorter than this are dropped (ms)
    pub min_turn_duration_ms: i64,
    /// Same-speaker turns closer than this are merged (ms)
    pub merge_gap_ms: i64,
}

impl Default for DiarizerConfig {
    fn default() -> Self {
        Self {
            window_secs: 10.0,
            sample_rate: 16_000,
            min_turn_duration_ms: 200,
            merge_gap_ms: 150,
        }
    }
}

/// ONNX speaker segmentation engine
pub struct Diarizer {
    session: Mutex<Session>,
    config: DiarizerConfig,
}

impl Diarizer {
    /// Load the segmentation model from an ONNX file
    pub fn new(model_path: &Path, config: DiarizerConfig) -> Result<Self> {
        tracing::info!(
            "Loading speaker segmentation model from: {}",
            model_path.display()
        );

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .context("Failed to load speaker segmentation model")?;

        tracing::info!(
            "Diarizer initialized: window={:.0}s, min_turn={}ms",
            config.window_secs,
            config.min_turn_duration_ms
        );

        Ok(Self {
            session: Mutex::new(session),
            config,
        })
    }

    /// Create with default configuration
    pub fn with_defaults(model_path: &Path) -> Result<Self> {
        Self::new(model_path, DiarizerConfig::default())
    }

    /// Diarize 16 kHz mono samples into ordered speaker turns
    pub fn diarize(&self, samples: &[f32]) -> Result<Vec<SpeakerTurn>> {
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        let start_time = std::time::Instant::now();
        let window_len = (self.config.window_secs * self.config.sample_rate as f32) as usize;

        let mut turns: Vec<SpeakerTurn> = Vec::new();

        for (window_idx, window) in samples.chunks(window_len).enumerate() {
            let window_offset_ms =
                (window_idx * window_len) as i64 * 1000 / self.config.sample_rate as i64;
            let window_ms = window.len() as i64 * 1000 / self.config.sample_rate as i64;

            // Pad the trailing window to the full length
            let window_data = if window.len() < window_len {
                let mut padded = vec![0.0; window_len];
                padded[..window.len()].copy_from_slice(window);
                padded
            } else {
                window.to_vec()
            };

            let activity = self.run_window(window_data, window_len)?;
            let frames = activity.len();
            if frames == 0 {
                continue;
            }

            // Frame duration inside this window; clamp emitted turns to
            // the unpadded audio length
            let ms_per_frame = (self.config.window_secs * 1000.0) / frames as f32;

            for speaker in 0..NUM_SPEAKERS {
                let mut frame = 0;
                while frame < frames {
                    if !activity[frame][speaker] {
                        frame += 1;
                        continue;
                    }
                    let run_start = frame;
                    while frame < frames && activity[frame][speaker] {
                        frame += 1;
                    }

                    let start_ms =
                        window_offset_ms + (run_start as f32 * ms_per_frame) as i64;
                    let end_ms = (window_offset_ms + (frame as f32 * ms_per_frame) as i64)
                        .min(window_offset_ms + window_ms);

                    if end_ms > start_ms {
                        turns.push(SpeakerTurn {
                            start: start_ms,
                            end: end_ms,
                            speaker: format!("SPEAKER_{:02}", speaker),
                        });
                    }
                }
            }
        }

        let turns = tidy_turns(
            turns,
            self.config.min_turn_duration_ms,
            self.config.merge_gap_ms,
        );

        let elapsed = start_time.elapsed();
        let audio_duration = samples.len() as f64 / self.config.sample_rate as f64;
        let num_speakers = {
            let mut speakers: Vec<&str> = turns.iter().map(|t| t.speaker.as_str()).collect();
            speakers.sort_unstable();
            speakers.dedup();
            speakers.len()
        };
        tracing::info!(
            "Diarization: processed {:.1}s audio in {:.2}s, {} turns from {} speakers",
            audio_duration,
            elapsed.as_secs_f64(),
            turns.len(),
            num_speakers
        );

        Ok(turns)
    }

    /// Run one window through the model and decode per-frame activity
    fn run_window(&self, window_data: Vec<f32>, window_len: usize) -> Result<Vec<[bool; NUM_SPEAKERS]>> {
        let input_tensor = ort::value::Tensor::from_array((
            [1_i64, 1_i64, window_len as i64],
            window_data,
        ))?;

        let mut session = self.session.lock();
        let outputs = session.run(ort::inputs!["input" => input_tensor])?;

        let (_, value) = outputs.iter().next().context("No output tensor")?;
        let (shape, data) = value.try_extract_tensor::<f32>()?;

        // Output layout: [1, frames, classes]
        if shape.len() != 3 {
            anyhow::bail!("Unexpected segmentation output rank: {}", shape.len());
        }
        let frames = shape[1] as usize;
        let classes = shape[2] as usize;
        if classes > POWERSET.len() {
            anyhow::bail!("Unexpected segmentation class count: {}", classes);
        }

        Ok(decode_powerset(data, frames, classes))
    }
}

/// Argmax-decode powerset class scores into per-frame speaker activity
fn decode_powerset(data: &[f32], frames: usize, classes: usize) -> Vec<[bool; NUM_SPEAKERS]> {
    let mut activity = vec![[false; NUM_SPEAKERS]; frames];

    for (frame, frame_activity) in activity.iter_mut().enumerate() {
        let scores = &data[frame * classes..(frame + 1) * classes];
        let best_class = scores
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)
            .unwrap_or(0);

        for &speaker in POWERSET[best_class] {
            frame_activity[speaker] = true;
        }
    }

    activity
}

/// Sort, merge close same-speaker turns, and drop short blips
fn tidy_turns(mut turns: Vec<SpeakerTurn>, min_duration_ms: i64, merge_gap_ms: i64) -> Vec<SpeakerTurn> {
    if turns.is_empty() {
        return turns;
    }

    turns.sort_by(|a, b| a.start.cmp(&b.start).then(a.speaker.cmp(&b.speaker)));

    let mut merged: Vec<SpeakerTurn> = Vec::new();
    for turn in turns {
        if let Some(prev) = merged
            .iter_mut()
            .rev()
            .find(|prev| prev.speaker == turn.speaker)
        {
            if turn.start - prev.end <= merge_gap_ms {
                prev.end = prev.end.max(turn.end);
                continue;
            }
        }
        merged.push(turn);
    }

    merged.retain(|t| t.end - t.start >= min_duration_ms);
    merged.sort_by(|a, b| a.start.cmp(&b.start).then(a.speaker.cmp(&b.speaker)));
    merged
}
