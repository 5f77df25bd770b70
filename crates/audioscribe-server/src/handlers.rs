//! HTTP handlers

use crate::error::ApiError;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use audioscribe_types::{JobRequest, ModelSize, LANGUAGES};
use serde::Deserialize;
use serde_json::json;

/// GET /health
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /api/v1/jobs
///
/// Accepts a job for the single slot; 202 with the job id on success,
/// 409 when a job is already running.
pub async fn submit_job(
    state: web::Data<AppState>,
    req: web::Json<JobRequest>,
) -> Result<HttpResponse, ApiError> {
    let job_id = state.submit(req.into_inner())?;
    Ok(HttpResponse::Accepted().json(json!({ "jobId": job_id })))
}

/// GET /api/v1/jobs/current
pub async fn current_job(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.slot.progress.snapshot())
}

/// POST /api/v1/jobs/current/cancel
pub async fn cancel_job(state: web::Data<AppState>) -> HttpResponse {
    let cancelled = state.slot.request_cancel();
    HttpResponse::Ok().json(json!({ "cancelled": cancelled }))
}

#[derive(Deserialize)]
pub struct SaveTokenRequest {
    token: String,
}

/// POST /api/v1/token
pub async fn save_token(
    state: web::Data<AppState>,
    req: web::Json<SaveTokenRequest>,
) -> Result<HttpResponse, ApiError> {
    state
        .tokens
        .save(&req.token)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(HttpResponse::Ok().json(json!({ "saved": true })))
}

/// GET /api/v1/token
///
/// Reports presence only; the token itself is never echoed back.
pub async fn token_status(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "present": state.tokens.has_token() }))
}

/// GET /api/v1/languages
pub async fn languages() -> HttpResponse {
    let catalog: Vec<_> = LANGUAGES
        .iter()
        .map(|(name, code)| json!({ "name": name, "code": code }))
        .collect();
    HttpResponse::Ok().json(catalog)
}

/// GET /api/v1/models
pub async fn models() -> HttpResponse {
    HttpResponse::Ok().json(ModelSize::all())
}

/// Route table
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health)).service(
        web::scope("/api/v1")
            .route("/jobs", web::post().to(submit_job))
            .route("/jobs/current", web::get().to(current_job))
            .route("/jobs/current/cancel", web::post().to(cancel_job))
            .route("/token", web::post().to(save_token))
            .route("/token", web::get().to(token_status))
            .route("/languages", web::get().to(languages))
            .route("/models", web::get().to(models)),
    );
}
