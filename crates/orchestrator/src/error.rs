//! Setup errors.

use thiserror::Error;

use kernel::IbError;

/// Failure while loading a configuration or building the system from it.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration is not valid JSON for [`crate::IbConfig`].
    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Validation(String),
    /// A marker file is malformed.
    #[error("{path}:{line}: {detail}")]
    Geometry {
        /// Marker file.
        path: String,
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        detail: String,
    },
    /// The kernel rejected the grid or a body.
    #[error(transparent)]
    Kernel(#[from] IbError),
}
