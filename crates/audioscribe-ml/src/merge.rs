//! Speaker label merge
//!
//! Annotates transcript segments with the speaker turns produced by
//! diarization. Each segment gets the speaker whose turn overlaps it
//! the most; exact overlap ties break to the lexically smallest
//! speaker label so the assignment is deterministic. Segments no turn
//! touches keep `speaker = None`.

use audioscribe_types::{SpeakerTurn, TranscriptSegment};
use std::collections::HashMap;

/// Assign speaker labels to segments by temporal overlap
pub fn assign_speakers(segments: &mut [TranscriptSegment], turns: &[SpeakerTurn]) {
    if turns.is_empty() {
        return;
    }

    for segment in segments.iter_mut() {
        segment.speaker = best_speaker_for(segment.start, segment.end, turns);
    }
}

/// Pick the speaker with the greatest overlap against [start, end)
fn best_speaker_for(start: i64, end: i64, turns: &[SpeakerTurn]) -> Option<String> {
    let mut overlap_by_speaker: HashMap<&str, i64> = HashMap::new();

    for turn in turns {
        let overlap = overlap_ms(start, end, turn.start, turn.end);
        if overlap > 0 {
            *overlap_by_speaker.entry(turn.speaker.as_str()).or_insert(0) += overlap;
        }
    }

    overlap_by_speaker
        .into_iter()
        // max_by prefers later elements on ties, so order the comparison
        // to land on the lexically smallest label
        .max_by(|(speaker_a, overlap_a), (speaker_b, overlap_b)| {
            overlap_a
                .cmp(overlap_b)
                .then_with(|| speaker_b.cmp(speaker_a))
        })
        .map(|(speaker, _)| speaker.to_string())
}

fn overlap_ms(a_start: i64, a_end: i64, b_start: i64, b_end: i64) -> i64 {
    (a_end.min(b_end) - a_start.max(b_start)).max(0)
}
