//! Error types for the video-analysis-checker library.
//!
//! Errors are split into two families: fatal ones (missing or invalid
//! configuration, rejected credentials) that should abort a run, and
//! recoverable ones (a single failed fetch or trigger) after which the
//! caller may continue with an empty result.

use thiserror::Error;

/// Errors that can occur while auditing videos.
#[derive(Error, Debug)]
pub enum CheckerError {
    /// A required configuration value is not set
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    /// A configuration value is present but unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The backend service key does not look like a JWT
    #[error("Invalid service key: {0}")]
    InvalidServiceKey(String),

    /// The backend rejected the credentials (HTTP 401)
    #[error("Authentication failed for {0}, check the service key")]
    Unauthorized(String),

    /// The requested table is not exposed by the backend (HTTP 404)
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Any other non-success HTTP status
    #[error("Unexpected response {status} from {url}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Request URL without query string
        url: String,
        /// Response body, truncated
        body: String,
    },

    /// Transport-level HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV export errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Direct database access errors
    #[error("Database error: {0}")]
    Database(String),

    /// Resumable upload protocol errors
    #[error("Upload error: {0}")]
    Upload(String),

    /// The uploaded file never became usable
    #[error("File processing failed: {0}")]
    Processing(String),

    /// The generate-content call returned no usable text
    #[error("Generation error: {0}")]
    Generation(String),

    /// The reanalysis trigger endpoint rejected both payloads
    #[error("Trigger error: {0}")]
    Trigger(String),

    /// General error with context
    #[error("{0}")]
    Other(String),
}

impl CheckerError {
    /// Whether the error should abort the whole run rather than be skipped.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingConfig(_) | Self::InvalidConfig(_) | Self::InvalidServiceKey(_) | Self::Unauthorized(_)
        )
    }

    /// Short machine-friendly name used as a metrics label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingConfig(_) | Self::InvalidConfig(_) => "config",
            Self::InvalidServiceKey(_) | Self::Unauthorized(_) => "auth",
            Self::TableNotFound(_) | Self::Status { .. } => "status",
            Self::Http(_) => "http",
            Self::Serialization(_) | Self::Csv(_) => "serialization",
            Self::Io(_) => "io",
            Self::Database(_) => "database",
            Self::Upload(_) | Self::Processing(_) | Self::Generation(_) => "file_api",
            Self::Trigger(_) => "trigger",
            Self::Other(_) => "other",
        }
    }
}

/// Convenience type alias for Result with `CheckerError`
pub type Result<T> = std::result::Result<T, CheckerError>;

impl From<anyhow::Error> for CheckerError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<config::ConfigError> for CheckerError {
    fn from(err: config::ConfigError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

#[cfg(feature = "direct-sql")]
impl From<diesel::result::Error> for CheckerError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[cfg(feature = "direct-sql")]
impl From<r2d2::Error> for CheckerError {
    fn from(err: r2d2::Error) -> Self {
        Self::Database(err.to_string())
    }
}
