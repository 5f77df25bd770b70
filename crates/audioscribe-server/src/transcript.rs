//! Transcript formatting and output
//!
//! Renders the final text file: a header block, one timestamped line
//! per segment (with the speaker label when present), and a plain
//! "Full Text" section at the end.

use anyhow::{Context, Result};
use audioscribe_types::TranscriptSegment;
use chrono::{DateTime, Local};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const SEPARATOR_WIDTH: usize = 60;

/// Metadata printed in the transcript header
pub struct TranscriptMeta {
    pub file_name: String,
    pub model: String,
    /// Display name of the language the transcript was produced in
    pub language: String,
    pub date: DateTime<Local>,
}

/// Format milliseconds as HH:MM:SS
pub fn format_timestamp(ms: i64) -> String {
    let total_secs = (ms.max(0)) / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Render the complete transcript document
pub fn render(meta: &TranscriptMeta, segments: &[TranscriptSegment]) -> String {
    let separator = "=".repeat(SEPARATOR_WIDTH);
    let mut out = String::new();

    out.push_str("AudioScribe Transcript\n");
    out.push_str(&separator);
    out.push('\n');
    out.push_str(&format!("File: {}\n", meta.file_name));
    out.push_str(&format!(
        "Date: {}\n",
        meta.date.format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format!("Model: {}\n", meta.model));
    out.push_str(&format!("Language: {}\n", meta.language));
    out.push_str(&separator);
    out.push_str("\n\n");

    for segment in segments {
        let stamp = format_timestamp(segment.start);
        match &segment.speaker {
            Some(speaker) => {
                out.push_str(&format!("[{}] {}: {}\n", stamp, speaker, segment.text))
            }
            None => out.push_str(&format!("[{}] {}\n", stamp, segment.text)),
        }
    }

    out.push('\n');
    out.push_str(&separator);
    out.push('\n');
    out.push_str("Full Text:\n\n");
    let full_text: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
    out.push_str(&full_text.join(" "));
    out.push('\n');

    out
}

/// Output file name: `{stem}_transcript_{YYYYmmdd_HHMMSS}.txt`
pub fn output_file_name(stem: &str, now: DateTime<Local>) -> String {
    format!("{}_transcript_{}.txt", stem, now.format("%Y%m%d_%H%M%S"))
}

/// Write the transcript, creating the output directory if needed
pub fn write_transcript(dir: &Path, file_name: &str, contents: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let path = dir.join(file_name);
    let mut file = fs::File::create(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;

    tracing::info!("Transcript written to {}", path.display());
    Ok(path)
}
