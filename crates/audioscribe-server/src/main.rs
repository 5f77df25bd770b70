//! AudioScribe server binary
//!
//! Local HTTP front end for the transcription pipeline. Binds to
//! loopback and serves the job, token and catalog endpoints.

mod config;
mod error;
mod handlers;
mod job;
mod progress;
mod state;
mod token_store;
mod transcript;

use actix_web::{web, App, HttpServer};
use config::AppConfig;
use state::AppState;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("audioscribe=info,actix_web=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = AppConfig::load()?;
    let bind_addr = config.bind_addr();

    tracing::info!(
        "AudioScribe v{} starting on http://{}:{}",
        env!("CARGO_PKG_VERSION"),
        bind_addr.0,
        bind_addr.1
    );
    tracing::info!("Transcripts will be written to {}", config.output_dir.display());

    let state = AppState::new(config);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(handlers::configure)
    })
    .bind(bind_addr)?
    .run()
    .await?;

    Ok(())
}
