//! Job progress reporting
//!
//! The pipeline reports through `ProgressSink`; the HTTP layer polls
//! the shared snapshot. Writes overwrite the previous snapshot (last
//! write wins) and the fraction is clamped so a poller never sees it
//! move backwards within a run.

use audioscribe_types::{JobStage, ProgressSnapshot};
use parking_lot::RwLock;
use std::path::PathBuf;

/// Sink for pipeline progress, implemented by the shared snapshot and
/// by test doubles
pub trait ProgressSink: Send + Sync {
    /// Report a stage transition or an in-stage update
    fn report(&self, stage: JobStage, fraction: f32, message: &str);

    /// Record a non-fatal problem; the job keeps running
    fn warn(&self, message: &str);
}

/// Shared snapshot of the current job's progress
#[derive(Default)]
pub struct SharedProgress {
    inner: RwLock<ProgressSnapshot>,
}

impl SharedProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.inner.read().clone()
    }

    /// Reset to a fresh Queued snapshot before a new job starts
    pub fn reset(&self) {
        *self.inner.write() = ProgressSnapshot::default();
    }

    /// Mark the job failed. The error message is prefixed with the
    /// stage that raised it.
    pub fn fail(&self, stage: JobStage, message: &str) {
        let mut inner = self.inner.write();
        inner.stage = JobStage::Failed;
        inner.error = Some(format!("{}: {}", stage, message));
        inner.message = None;
        tracing::error!("Job failed during {}: {}", stage, message);
    }

    /// Mark the job done and record where the transcript was written
    pub fn finish(&self, output_path: PathBuf) {
        let mut inner = self.inner.write();
        inner.stage = JobStage::Done;
        inner.fraction = 1.0;
        inner.message = None;
        inner.output_path = Some(output_path);
    }
}

impl ProgressSink for SharedProgress {
    fn report(&self, stage: JobStage, fraction: f32, message: &str) {
        let mut inner = self.inner.write();
        // Keep the fraction in [0, 1] and non-decreasing
        let fraction = fraction.clamp(0.0, 1.0).max(inner.fraction);
        inner.stage = stage;
        inner.fraction = fraction;
        inner.message = Some(message.to_string());
        tracing::info!("[{:.0}%] {}: {}", fraction * 100.0, stage, message);
    }

    fn warn(&self, message: &str) {
        let mut inner = self.inner.write();
        inner.warnings.push(message.to_string());
        tracing::warn!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins() {
        let progress = SharedProgress::new();
        progress.report(JobStage::LoadingAudio, 0.2, "loading");
        progress.report(JobStage::Transcribing, 0.3, "transcribing");

        let snap = progress.snapshot();
        assert_eq!(snap.stage, JobStage::Transcribing);
        assert_eq!(snap.message.as_deref(), Some("transcribing"));
    }

    #[test]
    fn fraction_never_decreases() {
        let progress = SharedProgress::new();
        progress.report(JobStage::Transcribing, 0.6, "a");
        progress.report(JobStage::Transcribing, 0.4, "b");

        let snap = progress.snapshot();
        assert_eq!(snap.fraction, 0.6);
        // Stage and message still move
        assert_eq!(snap.message.as_deref(), Some("b"));
    }

    #[test]
    fn fraction_is_clamped_to_unit_interval() {
        let progress = SharedProgress::new();
        progress.report(JobStage::Transcribing, 1.7, "over");
        assert_eq!(progress.snapshot().fraction, 1.0);
    }

    #[test]
    fn warnings_accumulate() {
        let progress = SharedProgress::new();
        progress.warn("first");
        progress.warn("second");
        assert_eq!(progress.snapshot().warnings, vec!["first", "second"]);
    }

    #[test]
    fn fail_prefixes_the_stage() {
        let progress = SharedProgress::new();
        progress.report(JobStage::Transcribing, 0.3, "working");
        progress.fail(JobStage::Transcribing, "inference failed");

        let snap = progress.snapshot();
        assert_eq!(snap.stage, JobStage::Failed);
        assert_eq!(
            snap.error.as_deref(),
            Some("transcribing: inference failed")
        );
    }

    #[test]
    fn finish_sets_done_and_output_path() {
        let progress = SharedProgress::new();
        progress.report(JobStage::WritingOutput, 0.95, "writing");
        progress.finish(PathBuf::from("/tmp/out.txt"));

        let snap = progress.snapshot();
        assert_eq!(snap.stage, JobStage::Done);
        assert_eq!(snap.fraction, 1.0);
        assert_eq!(snap.output_path, Some(PathBuf::from("/tmp/out.txt")));
    }

    #[test]
    fn reset_clears_everything() {
        let progress = SharedProgress::new();
        progress.report(JobStage::Transcribing, 0.5, "mid");
        progress.warn("stale");
        progress.reset();

        let snap = progress.snapshot();
        assert_eq!(snap.stage, JobStage::Queued);
        assert_eq!(snap.fraction, 0.0);
        assert!(snap.warnings.is_empty());
    }
}
