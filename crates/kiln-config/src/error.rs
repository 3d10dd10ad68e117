//! Configuration store errors.

use std::io;
use std::path::PathBuf;

/// Errors raised while building or persisting a configuration tree.
///
/// Every variant is fatal for startup: nothing downstream of the store can
/// run without configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration root unreadable: {path}: {reason}")]
    RootUnreadable { path: PathBuf, reason: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid fragment {path}: {reason}")]
    InvalidFragment { path: PathBuf, reason: String },

    #[error("Directory scan failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Snapshot serialization failed: {0}")]
    Serialize(String),
}
