use crate::embedding::EmbeddingError;
use crate::reduction::ReductionError;
use crate::search::SearchError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for papermap
#[derive(Error, Debug)]
pub enum PapermapError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Unrecognized strategy, reducer or metric selection
    #[error("Invalid {kind} selection '{value}', expected one of {expected:?}")]
    InvalidConfiguration {
        kind: &'static str,
        value: String,
        expected: &'static [&'static str],
    },

    /// Snapshot or artifact file missing
    #[error("Snapshot not found: {path}")]
    SnapshotNotFound { path: PathBuf },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Embedding provider errors
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Search construction and query errors
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Dimensionality reduction errors
    #[error("Reduction error: {0}")]
    Reduction(#[from] ReductionError),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for papermap operations
pub type Result<T> = std::result::Result<T, PapermapError>;
