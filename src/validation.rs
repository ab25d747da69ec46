use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

use crate::error::{CheckerError, Result};

#[allow(clippy::expect_used)]
fn jwt_shape() -> &'static Regex {
    static JWT: OnceLock<Regex> = OnceLock::new();
    JWT.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]*$").expect("valid JWT pattern"))
}

/// Validation utilities for credentials and command inputs
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate the backend project URL
    pub fn validate_backend_url(url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(CheckerError::MissingConfig("SUPABASE_URL".into()));
        }

        if !url.starts_with("https://") && !url.starts_with("http://") {
            return Err(CheckerError::InvalidConfig(format!("Backend URL must start with http:// or https://: {url}")));
        }

        if url.len() > 2048 {
            return Err(CheckerError::InvalidConfig("Backend URL too long".into()));
        }

        Ok(())
    }

    /// Validate that the service key looks like a JWT
    pub fn validate_service_key(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(CheckerError::MissingConfig("SUPABASE_SERVICE_ROLE_KEY".into()));
        }

        if !key.starts_with("eyJ") {
            return Err(CheckerError::InvalidServiceKey(format!(
                "key doesn't look like a JWT, starts with: {}",
                crate::utils::truncate_string(key, 20)
            )));
        }

        if !jwt_shape().is_match(key) {
            return Err(CheckerError::InvalidServiceKey(
                "key must be three base64url segments separated by dots".into(),
            ));
        }

        Ok(())
    }

    /// Validate a Postgres connection string
    pub fn validate_database_url(url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(CheckerError::MissingConfig("DATABASE_URL".into()));
        }

        if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
            return Err(CheckerError::InvalidConfig("Only Postgres connection strings are supported".into()));
        }

        if url.len() > 1000 {
            return Err(CheckerError::InvalidConfig("Database URL too long".into()));
        }

        Ok(())
    }

    /// Validate a local video file before uploading it
    pub fn validate_video_path(path: &Path) -> Result<u64> {
        if path.as_os_str().is_empty() {
            return Err(CheckerError::InvalidConfig("Video path cannot be empty".into()));
        }

        let metadata = std::fs::metadata(path)
            .map_err(|e| CheckerError::InvalidConfig(format!("Cannot access {}: {e}", path.display())))?;

        if !metadata.is_file() {
            return Err(CheckerError::InvalidConfig(format!("Not a file: {}", path.display())));
        }

        if metadata.len() == 0 {
            return Err(CheckerError::InvalidConfig(format!("File is empty: {}", path.display())));
        }

        Ok(metadata.len())
    }

    /// Validate upload chunk size in MiB
    pub fn validate_chunk_size_mb(size_mb: u64) -> Result<()> {
        if size_mb == 0 {
            return Err(CheckerError::InvalidConfig("Chunk size must be positive".into()));
        }

        if size_mb > 1024 {
            return Err(CheckerError::InvalidConfig("Chunk size too large (max 1024 MB)".into()));
        }

        Ok(())
    }

    /// Validate the delay between reanalysis triggers
    pub fn validate_delay_secs(delay_secs: u64) -> Result<()> {
        if delay_secs > 3600 {
            return Err(CheckerError::InvalidConfig("Reanalysis delay too large (max 3600 seconds)".into()));
        }

        Ok(())
    }
}
