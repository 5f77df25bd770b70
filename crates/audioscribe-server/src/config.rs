//! Server configuration
//!
//! Defaults match the original desktop tool (loopback bind on 7860,
//! transcripts into the user's downloads directory), with environment
//! overrides for every knob.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Environment variable carrying the access token for gated model
/// downloads; read once at startup
pub const TOKEN_ENV_VAR: &str = "AUDIOSCRIBE_HF_TOKEN";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind address; loopback by default, this is a local tool
    pub host: String,
    pub port: u16,
    /// Where transcripts are written
    pub output_dir: PathBuf,
    /// Access token supplied via environment, if any
    pub env_token: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7860,
            output_dir: default_output_dir(),
            env_token: None,
        }
    }
}

impl AppConfig {
    /// Build configuration from defaults plus environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = env::var("AUDIOSCRIBE_HOST") {
            config.host = host;
        }
        if let Ok(port) = env::var("AUDIOSCRIBE_PORT") {
            config.port = port
                .parse()
                .with_context(|| format!("Invalid AUDIOSCRIBE_PORT: {}", port))?;
        }
        if let Ok(dir) = env::var("AUDIOSCRIBE_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        config.env_token = env::var(TOKEN_ENV_VAR).ok().filter(|t| !t.trim().is_empty());

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("Server port must be non-zero");
        }
        if self.host.is_empty() {
            anyhow::bail!("Server host must not be empty");
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

/// Downloads directory, falling back to ~/Downloads, then cwd
fn default_output_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("."))
}
