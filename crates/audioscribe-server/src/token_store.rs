//! Access token persistence
//!
//! The diarization weights are gated; the token that unlocks them is
//! kept in a plain text file in the user's home directory, same
//! location the original tool used. A token supplied through the
//! environment acts as a fallback when no file exists.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

const TOKEN_FILE_NAME: &str = ".audioscribe_token.txt";

pub struct TokenStore {
    path: PathBuf,
    env_token: Option<String>,
}

impl TokenStore {
    /// Store backed by ~/.audioscribe_token.txt
    pub fn new(env_token: Option<String>) -> Self {
        let path = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(TOKEN_FILE_NAME);
        Self { path, env_token }
    }

    /// Store backed by an explicit file path (tests)
    pub fn with_path(path: PathBuf, env_token: Option<String>) -> Self {
        Self { path, env_token }
    }

    /// Persist a token, replacing any previous one
    pub fn save(&self, token: &str) -> Result<()> {
        let token = token.trim();
        if token.is_empty() {
            anyhow::bail!("Token must not be empty");
        }

        let mut file = fs::File::create(&self.path)
            .with_context(|| format!("Failed to create {}", self.path.display()))?;
        file.write_all(token.as_bytes())?;
        file.flush()?;

        tracing::info!("Access token saved to {}", self.path.display());
        Ok(())
    }

    /// Resolve the token: saved file first, environment fallback
    pub fn load(&self) -> Option<String> {
        if let Ok(contents) = fs::read_to_string(&self.path) {
            let token = contents.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
        self.env_token.clone()
    }

    pub fn has_token(&self) -> bool {
        self.load().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = TokenStore::with_path(dir.path().join("token.txt"), None);

        assert!(store.load().is_none());
        store.save("  hf_abc123  ").unwrap();
        assert_eq!(store.load().as_deref(), Some("hf_abc123"));
        assert!(store.has_token());
    }

    #[test]
    fn empty_token_is_rejected() {
        let dir = tempdir().unwrap();
        let store = TokenStore::with_path(dir.path().join("token.txt"), None);
        assert!(store.save("   ").is_err());
    }

    #[test]
    fn file_takes_precedence_over_env() {
        let dir = tempdir().unwrap();
        let store = TokenStore::with_path(
            dir.path().join("token.txt"),
            Some("hf_from_env".to_string()),
        );

        assert_eq!(store.load().as_deref(), Some("hf_from_env"));
        store.save("hf_from_file").unwrap();
        assert_eq!(store.load().as_deref(), Some("hf_from_file"));
    }

    #[test]
    fn blank_file_falls_back_to_env() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token.txt");
        fs::write(&path, "\n").unwrap();

        let store = TokenStore::with_path(path, Some("hf_from_env".to_string()));
        assert_eq!(store.load().as_deref(), Some("hf_from_env"));
    }
}
