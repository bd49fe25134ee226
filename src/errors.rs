//! # Configuration Error Types Module
//!
//! This module defines the error types raised while loading and compiling the
//! alias table, quantity pattern configuration and forwarder allowlist.
//! Resolution itself never fails: malformed chat lines are dropped, not reported.

use std::path::PathBuf;

/// Errors raised while building the resolver configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration JSON is malformed or lacks a required key
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A required key is present but unusable
    #[error("missing configuration key: {0}")]
    MissingKey(String),

    /// A unit vocabulary that must carry at least one synonym is empty
    #[error("unit vocabulary '{0}' must not be empty")]
    EmptyVocabulary(&'static str),

    /// A vocabulary entry is empty or whitespace
    #[error("entry {index} of '{vocabulary}' is blank")]
    BlankEntry {
        vocabulary: &'static str,
        index: usize,
    },

    /// A configured pattern failed to compile
    #[error("pattern '{name}' is not a valid regex: {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    /// A command pattern lacks a named capture group the resolver reads
    #[error("pattern '{pattern}' must define the named group '{group}'")]
    MissingCaptureGroup {
        pattern: &'static str,
        group: &'static str,
    },

    /// Forwarder mode was requested without any forwarder account
    #[error("forwarder allowlist is empty")]
    NoForwarders,
}

/// Result alias for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    /// Wrap a regex compilation failure with the name of the offending pattern
    pub fn invalid_pattern(name: impl Into<String>, source: regex::Error) -> Self {
        ConfigError::InvalidPattern {
            name: name.into(),
            source,
        }
    }
}
