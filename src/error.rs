//! Error types for rulelight

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for highlighter operations
pub type Result<T> = std::result::Result<T, HighlightError>;

/// Highlighter error types
///
/// Scanning never fails, so everything here comes from the file system
/// side: locating rule files, reading them, and persisting compiled rules.
#[derive(Error, Debug)]
pub enum HighlightError {
    #[error("No rule file for language '{language}' (and no fallback) in {}", rules_dir.display())]
    RuleFileNotFound { language: String, rules_dir: PathBuf },

    #[error("Cannot write rule cache {}: {source}", path.display())]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Message(String),
}

impl HighlightError {
    /// Whether the caller should fall back to unhighlighted output
    pub fn is_missing_rules(&self) -> bool {
        matches!(self, HighlightError::RuleFileNotFound { .. })
    }
}
