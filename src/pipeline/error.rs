//! Pipeline Error Types
//!
//! One variant per failing stage. The orchestrator stops at the first error,
//! so a `StageError` also tells which artifacts were left on disk.

use thiserror::Error;

/// Error raised by a single conversion stage
#[derive(Error, Debug)]
pub enum StageError {
    /// Raw provider document is not well-formed markup
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Artifact write failed
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Intermediate tree could not be mapped onto the schedule schema
    #[error("Normalize error: {message}")]
    Normalize { message: String },

    /// Normalized tree could not be encoded as markup
    #[error("Serialize error: {message}")]
    Serialize { message: String },
}

impl StageError {
    pub fn parse(message: impl Into<String>) -> Self {
        StageError::Parse {
            message: message.into(),
        }
    }

    pub fn io<P: AsRef<std::path::Path>>(path: P, source: std::io::Error) -> Self {
        StageError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub fn normalize(message: impl Into<String>) -> Self {
        StageError::Normalize {
            message: message.into(),
        }
    }

    pub fn serialize(message: impl Into<String>) -> Self {
        StageError::Serialize {
            message: message.into(),
        }
    }

    /// Name of the stage that produced this error, for logs
    pub fn stage(&self) -> &'static str {
        match self {
            StageError::Parse { .. } => "parse",
            StageError::Io { .. } => "persist",
            StageError::Normalize { .. } => "normalize",
            StageError::Serialize { .. } => "serialize",
        }
    }
}

impl From<serde_json::Error> for StageError {
    fn from(error: serde_json::Error) -> Self {
        StageError::serialize(format!("JSON encoding failed: {error}"))
    }
}
