//! Segment timestamp alignment
//!
//! Whisper's segment boundaries are approximate; its token-level word
//! timings are tighter. This stage snaps each segment to its word
//! timings after repairing anomalous word durations. Alignment is
//! best-effort: when a run yields no word timings at all (some
//! languages and models do not produce them), the caller keeps the
//! unrefined timestamps instead of failing the job.

use audioscribe_types::TranscriptSegment;
use thiserror::Error;

/// Whisper sometimes emits words spanning several seconds
const MAX_WORD_DURATION_MS: i64 = 2000;
/// Repaired words end this long after their start, or at the next word
const REPAIRED_WORD_DURATION_MS: i64 = 500;

#[derive(Debug, Error)]
pub enum AlignError {
    #[error("no word-level timings available for this language/model")]
    NoWordTimings,
}

/// Refine segment boundaries from word-level timings.
///
/// Returns the input unchanged inside `Err` semantics: on failure the
/// caller should keep the segments it already has.
pub fn refine_timestamps(
    segments: Vec<TranscriptSegment>,
) -> Result<Vec<TranscriptSegment>, AlignError> {
    if segments.is_empty() {
        return Ok(segments);
    }

    if segments.iter().all(|s| s.words.is_empty()) {
        return Err(AlignError::NoWordTimings);
    }

    let mut segments = fix_anomalous_word_durations(segments);

    for segment in &mut segments {
        if let (Some(first), Some(last)) = (segment.words.first(), segment.words.last()) {
            segment.start = first.start;
            segment.end = last.end.max(first.start);
        }
    }

    tracing::debug!("Alignment refined {} segments", segments.len());

    Ok(segments)
}

/// Cap anomalously long word durations
fn fix_anomalous_word_durations(
    mut segments: Vec<TranscriptSegment>,
) -> Vec<TranscriptSegment> {
    for segment in &mut segments {
        let words_len = segment.words.len();
        for j in 0..words_len {
            let duration = segment.words[j].end - segment.words[j].start;

            if duration > MAX_WORD_DURATION_MS {
                let mut new_end = segment.words[j].start + REPAIRED_WORD_DURATION_MS;
                if j + 1 < words_len {
                    let next_start = segment.words[j + 1].start;
                    if next_start < new_end {
                        new_end = next_start;
                    }
                }
                tracing::trace!(
                    "align: word '{}' duration {}ms capped to {}ms",
                    segment.words[j].text,
                    duration,
                    new_end - segment.words[j].start
                );
                segment.words[j].end = new_end;
            }
        }
    }

    segments
}
