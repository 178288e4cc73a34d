//! Error types for dual-writer configuration
//!
//! Storage errors are never wrapped by this crate: every backend failure
//! reaches the caller as the originating [`dw_store::StoreError`].

use std::path::PathBuf;

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Mode string is not one of `1`..`4`
    #[error("invalid dual writer mode: {0:?} (expected 1, 2, 3 or 4)")]
    InvalidMode(String),

    /// TOML could not be parsed
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration file could not be read
    #[error("failed to read configuration {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}
