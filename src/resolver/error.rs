//! Resolution errors
//!
//! Failures are return values: a failed dependency never unwinds through
//! unrelated resolutions.

use crate::scaffold::ScaffoldError;

/// Why a name could not be turned into a usable type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("Invalid type name: '{0}'")]
    InvalidName(String),

    #[error("Type '{0}' not found")]
    NotFound(String),

    #[error("Type '{0}' is already being resolved")]
    InProgress(String),

    #[error("Type '{0}' is not loaded")]
    NotLoaded(String),

    #[error("Type '{name}' depends on '{dependency}': {reason}")]
    Dependency {
        name: String,
        dependency: String,
        reason: String,
    },

    #[error("Type '{name}' failed to initialize: {reason}")]
    Initialization { name: String, reason: String },

    #[error("Type '{name}' could not be loaded: {reason}")]
    Load { name: String, reason: String },
}

/// Why a synthesized type could not be built
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Type '{0}' is already defined")]
    AlreadyDefined(String),

    #[error(transparent)]
    Synthesis(#[from] ScaffoldError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}
