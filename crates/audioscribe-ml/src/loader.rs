//! Model loading and caching
//!
//! `ModelCache` is the single owner of loaded model handles. It is
//! keyed by (model size, backend): a request for the cached key
//! returns the existing handles with no I/O, any other key evicts the
//! old bundle and loads fresh. Weights are fetched through the
//! hf-hub cache; the diarization weights are gated and need a user
//! access token.
//!
//! Loading blocks for anywhere from seconds to minutes (download +
//! device initialization). Callers must keep it off the UI path.

use crate::device::{Backend, ResolvedDevice};
use crate::diarize::Diarizer;
use crate::whisper::WhisperEngine;
use audioscribe_types::ModelSize;
use hf_hub::api::sync::ApiBuilder;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// ggml Whisper weights, one file per size
const WHISPER_REPO: &str = "ggerganov/whisper.cpp";

/// Candidate sources for the gated segmentation weights, newest first.
/// The hub repo layout has changed across releases, so each candidate
/// is tried in order and the first success wins.
const SEGMENTATION_SOURCES: &[(&str, &str)] = &[
    ("pyannote/segmentation-3.0", "onnx/model.onnx"),
    ("pyannote/segmentation-3.0", "model.onnx"),
    ("pyannote/segmentation", "model.onnx"),
];

/// Errors raised while loading models
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to download model weights: {0}")]
    Download(String),

    #[error("failed to load transcription model: {0}")]
    Construct(String),

    #[error(
        "diarization weights unavailable after trying {attempts} source(s): {detail}. \
         Check that your access token is valid and that you accepted the model terms \
         on Hugging Face"
    )]
    GatedWeights { attempts: usize, detail: String },

    #[error("failed to load diarization model: {0}")]
    DiarizerConstruct(String),
}

/// Loaded model handles for one (model size, backend) key.
///
/// A job never sees its bundle change identity mid-run; the cache only
/// swaps bundles between jobs.
pub struct ModelBundle {
    pub model_size: ModelSize,
    pub device: ResolvedDevice,
    pub whisper: Arc<WhisperEngine>,
    pub diarizer: Option<Arc<Diarizer>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CacheKey {
    model_size: ModelSize,
    backend: Backend,
}

struct CacheState {
    whisper: Option<(CacheKey, Arc<WhisperEngine>)>,
    /// The diarizer runs on CPU through onnxruntime, so it is cached
    /// independently of the whisper key
    diarizer: Option<Arc<Diarizer>>,
}

/// Process-wide model cache, owned by the long-lived app state
pub struct ModelCache {
    state: Mutex<CacheState>,
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelCache {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CacheState {
                whisper: None,
                diarizer: None,
            }),
        }
    }

    /// Get model handles for a job, loading on cache miss.
    ///
    /// `token` authenticates the gated diarization download; pass the
    /// caller's resolved token only when diarization is requested.
    pub fn get(
        &self,
        model_size: ModelSize,
        device: ResolvedDevice,
        enable_diarization: bool,
        token: Option<&str>,
    ) -> Result<ModelBundle, ModelError> {
        let key = CacheKey {
            model_size,
            backend: device.backend,
        };

        let mut state = self.state.lock();

        let whisper = get_or_insert(&mut state.whisper, key, || load_whisper(model_size, &device))?;

        let diarizer = if enable_diarization {
            match &state.diarizer {
                Some(d) => Some(Arc::clone(d)),
                None => {
                    let d = Arc::new(load_diarizer(token)?);
                    state.diarizer = Some(Arc::clone(&d));
                    Some(d)
                }
            }
        } else {
            None
        };

        Ok(ModelBundle {
            model_size,
            device,
            whisper,
            diarizer,
        })
    }

    /// Drop every cached handle (used by tests and manual reloads)
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.whisper = None;
        state.diarizer = None;
        tracing::info!("Model cache cleared");
    }
}

/// Single-slot cache: a hit on the cached key is free, any other key
/// evicts the old entry and loads fresh
fn get_or_insert<T>(
    slot: &mut Option<(CacheKey, Arc<T>)>,
    key: CacheKey,
    load: impl FnOnce() -> Result<T, ModelError>,
) -> Result<Arc<T>, ModelError> {
    if let Some((cached_key, cached)) = slot {
        if *cached_key == key {
            tracing::debug!("Model cache hit: {} on {}", key.model_size, key.backend);
            return Ok(Arc::clone(cached));
        }
        tracing::info!(
            "Evicting cached model {} on {}",
            cached_key.model_size,
            cached_key.backend
        );
        *slot = None;
    }

    let loaded = Arc::new(load()?);
    *slot = Some((key, Arc::clone(&loaded)));
    Ok(loaded)
}

fn load_whisper(model_size: ModelSize, device: &ResolvedDevice) -> Result<WhisperEngine, ModelError> {
    let path = fetch_whisper_weights(model_size)?;
    WhisperEngine::new(&path, device).map_err(|e| ModelError::Construct(format!("{:#}", e)))
}

/// Download (or reuse from the hub cache) the ggml weights for a size
fn fetch_whisper_weights(model_size: ModelSize) -> Result<PathBuf, ModelError> {
    let filename = format!("ggml-{}.bin", model_size);
    tracing::info!("Fetching Whisper weights: {}/{}", WHISPER_REPO, filename);

    let api = ApiBuilder::new()
        .build()
        .map_err(|e| ModelError::Download(e.to_string()))?;

    api.model(WHISPER_REPO.to_string())
        .get(&filename)
        .map_err(|e| ModelError::Download(format!("{}/{}: {}", WHISPER_REPO, filename, e)))
}

fn load_diarizer(token: Option<&str>) -> Result<Diarizer, ModelError> {
    let path = fetch_segmentation_weights(token)?;
    Diarizer::with_defaults(&path).map_err(|e| ModelError::DiarizerConstruct(format!("{:#}", e)))
}

/// Try each gated-weights source in order; first success wins
fn fetch_segmentation_weights(token: Option<&str>) -> Result<PathBuf, ModelError> {
    let api = ApiBuilder::new()
        .with_token(token.map(|t| t.to_string()))
        .build()
        .map_err(|e| ModelError::Download(e.to_string()))?;

    let mut failures = Vec::new();

    for (repo, filename) in SEGMENTATION_SOURCES {
        tracing::info!("Fetching segmentation weights: {}/{}", repo, filename);
        match api.model(repo.to_string()).get(filename) {
            Ok(path) => return Ok(path),
            Err(e) => {
                tracing::warn!("Segmentation source {}/{} failed: {}", repo, filename, e);
                failures.push(format!("{}/{}: {}", repo, filename, e));
            }
        }
    }

    Err(ModelError::GatedWeights {
        attempts: SEGMENTATION_SOURCES.len(),
        detail: failures.join("; "),
    })
}
