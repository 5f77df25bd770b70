//! Shared application state and the single job slot
//!
//! The server runs at most one transcription job at a time. `JobSlot`
//! owns the running flag, the cancellation flag and the progress
//! snapshot; submission flips the flag atomically so two concurrent
//! submissions cannot both start.

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::job::run_job;
use crate::progress::SharedProgress;
use crate::token_store::TokenStore;
use audioscribe_ml::ModelCache;
use audioscribe_types::{is_supported_language, JobRequest};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

pub struct JobSlot {
    running: AtomicBool,
    pub cancel: Arc<AtomicBool>,
    pub progress: Arc<SharedProgress>,
}

impl Default for JobSlot {
    fn default() -> Self {
        Self {
            running: AtomicBool::new(false),
            cancel: Arc::new(AtomicBool::new(false)),
            progress: Arc::new(SharedProgress::new()),
        }
    }
}

impl JobSlot {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Claim the slot for a new job; fails when one is already running
    fn try_claim(&self) -> Result<(), ApiError> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| ApiError::Busy)
    }

    fn release(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Request cancellation of the running job, if any
    pub fn request_cancel(&self) -> bool {
        if self.is_running() {
            self.cancel.store(true, Ordering::SeqCst);
            tracing::info!("Cancellation requested");
            true
        } else {
            false
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub cache: Arc<ModelCache>,
    pub tokens: Arc<TokenStore>,
    pub slot: Arc<JobSlot>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let tokens = Arc::new(TokenStore::new(config.env_token.clone()));
        Self {
            config,
            cache: Arc::new(ModelCache::new()),
            tokens,
            slot: Arc::new(JobSlot::default()),
        }
    }

    /// Validate a request and start it on a blocking worker.
    ///
    /// Returns the new job id, or Busy when the slot is taken.
    pub fn submit(&self, req: JobRequest) -> Result<String, ApiError> {
        if !req.audio_path.is_file() {
            return Err(ApiError::BadRequest(format!(
                "Audio file not found: {}",
                req.audio_path.display()
            )));
        }
        if !is_supported_language(&req.language) {
            return Err(ApiError::BadRequest(format!(
                "Unsupported language code: {}",
                req.language
            )));
        }

        self.slot.try_claim()?;
        self.slot.cancel.store(false, Ordering::SeqCst);
        self.slot.progress.reset();

        let job_id = Uuid::new_v4().to_string();
        tracing::info!(
            "Job {} accepted: {} (model={}, language={}, diarization={})",
            job_id,
            req.audio_path.display(),
            req.model_size,
            req.language,
            req.enable_diarization
        );

        let cache = Arc::clone(&self.cache);
        let tokens = Arc::clone(&self.tokens);
        let slot = Arc::clone(&self.slot);
        let output_dir = self.config.output_dir.clone();

        tokio::task::spawn_blocking(move || {
            let result = run_job(
                &req,
                &cache,
                &tokens,
                &output_dir,
                slot.progress.as_ref(),
                &slot.cancel,
            );
            match result {
                Ok(path) => slot.progress.finish(path),
                Err(failure) => slot.progress.fail(failure.stage, &failure.message),
            }
            slot.release();
        });

        Ok(job_id)
    }
}
