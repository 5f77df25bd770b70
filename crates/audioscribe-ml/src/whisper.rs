//! Whisper transcription engine using whisper-rs
//!
//! Supports Metal GPU acceleration on macOS Apple Silicon.

use crate::device::ResolvedDevice;
use anyhow::{Context, Result};
use audioscribe_types::{TranscriptSegment, TranscriptWord};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Instant;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

/// Matches whisper special tokens: [_TT_xxx], [_EOT_], [_SOT_], [_BEG_], etc.
fn special_tokens_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\[_[A-Z]+_?\d*\]").unwrap())
}

/// Strip whisper special tokens and collapse the leftover whitespace
fn clean_special_tokens(text: &str) -> String {
    let cleaned = special_tokens_regex().replace_all(text, "");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Result of one transcription pass
#[derive(Debug, Clone)]
pub struct TranscriptionOutput {
    /// Segments ordered by start time, with word-level timestamps
    pub segments: Vec<TranscriptSegment>,
    /// Detected language (ISO 639-1), None when detection failed
    pub language: Option<String>,
}

/// Whisper transcription engine with Metal/GPU support
pub struct WhisperEngine {
    ctx: WhisperContext,
    use_gpu: bool,
}

impl WhisperEngine {
    /// Load a ggml Whisper model for the resolved device
    pub fn new(model_path: &Path, device: &ResolvedDevice) -> Result<Self> {
        tracing::info!("Loading Whisper model from: {}", model_path.display());

        let enable_gpu = device.use_gpu();

        let mut params = WhisperContextParameters::default();
        params.use_gpu(enable_gpu);

        if enable_gpu {
            params.flash_attn(true);
            tracing::info!("Whisper: {} acceleration enabled", device.backend);
        } else {
            tracing::info!("Whisper: using CPU inference");
        }

        let model_path = model_path
            .to_str()
            .context("Model path is not valid UTF-8")?;
        let ctx = WhisperContext::new_with_params(model_path, params)
            .context("Failed to load Whisper model")?;

        tracing::info!("Whisper model loaded");

        Ok(Self {
            ctx,
            use_gpu: enable_gpu,
        })
    }

    /// Check if GPU acceleration is enabled
    pub fn is_gpu_enabled(&self) -> bool {
        self.use_gpu
    }

    /// Transcribe 16 kHz mono samples.
    ///
    /// `language` is an ISO 639-1 code, or "auto" to let the model
    /// detect the language from the first window.
    pub fn transcribe(&self, samples: &[f32], language: &str) -> Result<TranscriptionOutput> {
        let start = Instant::now();

        let mut state = self
            .ctx
            .create_state()
            .context("Failed to create Whisper state")?;

        let params = Self::create_params(language);

        state
            .full(params, samples)
            .context("Whisper inference failed")?;

        let detected_language = {
            let lang_id = state.full_lang_id_from_state();
            whisper_rs::get_lang_str(lang_id).map(|s| s.to_string())
        };

        let num_segments = state.full_n_segments();
        let mut segments = Vec::new();

        for i in 0..num_segments {
            let segment = match state.get_segment(i) {
                Some(seg) => seg,
                None => continue,
            };

            let text = match segment.to_str() {
                Ok(t) => t.to_string(),
                Err(_) => match segment.to_str_lossy() {
                    Ok(t) => t.to_string(),
                    Err(_) => continue,
                },
            };

            // Timestamps arrive in centiseconds
            let start_ms = (segment.start_timestamp() * 10) as i64;
            let end_ms = (segment.end_timestamp() * 10) as i64;

            // Token-level word timings, consumed by the alignment stage
            let num_tokens = segment.n_tokens();
            let mut words = Vec::new();
            let mut current_word = String::new();
            let mut word_start = start_ms;

            for j in 0..num_tokens {
                let token = match segment.get_token(j) {
                    Some(t) => t,
                    None => continue,
                };

                let token_text = match token.to_str() {
                    Ok(t) => t.to_string(),
                    Err(_) => match token.to_str_lossy() {
                        Ok(t) => t.to_string(),
                        Err(_) => continue,
                    },
                };

                // Skip whisper special tokens
                if token_text.starts_with("[_") || token_text.starts_with(" [_") {
                    continue;
                }

                let token_data = token.token_data();

                // A leading space starts a new word
                if token_text.starts_with(' ') && !current_word.is_empty() {
                    let word_end = (token_data.t0 as i64) * 10;

                    let word_text = current_word.trim().to_string();
                    if !word_text.is_empty() {
                        words.push(TranscriptWord {
                            start: word_start,
                            end: word_end,
                            text: word_text,
                        });
                    }

                    current_word = token_text.trim_start().to_string();
                    word_start = word_end;
                } else {
                    current_word.push_str(&token_text);
                }
            }

            if !current_word.is_empty() {
                let word_text = current_word.trim().to_string();
                if !word_text.is_empty() && !word_text.starts_with("[_") {
                    words.push(TranscriptWord {
                        start: word_start,
                        end: end_ms,
                        text: word_text,
                    });
                }
            }

            let clean_text = clean_special_tokens(text.trim());
            if clean_text.is_empty() {
                continue;
            }

            segments.push(TranscriptSegment {
                start: start_ms,
                end: end_ms,
                text: clean_text,
                speaker: None,
                words,
            });
        }

        let elapsed = start.elapsed();
        let audio_duration = samples.len() as f64 / 16000.0;
        tracing::debug!(
            "Whisper: transcribed {:.1}s audio in {:.2}s, {} segments, language={:?}",
            audio_duration,
            elapsed.as_secs_f64(),
            segments.len(),
            detected_language
        );

        Ok(TranscriptionOutput {
            segments,
            language: detected_language,
        })
    }

    /// Create transcription parameters for one run
    fn create_params(language: &str) -> FullParams<'_, '_> {
        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        if language != "auto" {
            params.set_language(Some(language));
        }

        // Word timings feed the alignment stage
        params.set_token_timestamps(true);

        params.set_n_threads(4);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_special_tokens() {
        assert_eq!(
            clean_special_tokens("[_TT_123] hello [_EOT_] world"),
            "hello world"
        );
        assert_eq!(clean_special_tokens("[_BEG_]"), "");
        assert_eq!(clean_special_tokens("plain text"), "plain text");
    }

    #[test]
    fn collapses_whitespace_after_cleaning() {
        assert_eq!(clean_special_tokens("  a  [_SOT_]  b  "), "a b");
    }
}
