//! Error type definitions for the EPG daemon
//!
//! Errors are cycle-local: none of them terminates the process. The
//! scheduler logs them and still arms the next daily run.

use thiserror::Error;

use crate::pipeline::StageError;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Operation already in progress errors
    #[error("Operation already in progress: {operation_type} ({state})")]
    OperationInProgress { operation_type: String, state: String },

    /// Upstream EPG download errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Conversion pipeline errors
    #[error("Pipeline error: {0}")]
    Stage(#[from] StageError),

    /// File system errors outside the pipeline (playlist, raw artifact)
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Upstream EPG download errors
#[derive(Error, Debug)]
pub enum FetchError {
    /// The request never produced a response (DNS, connect, TLS, reset)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The upstream answered with a non-success status
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// The upstream answered with an empty body
    #[error("Empty response from {url}")]
    EmptyResponse { url: String },

    /// Developer mode could not read the raw export from disk
    #[error("Failed to read local export {path}: {source}")]
    LocalExport {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an operation in progress error
    pub fn operation_in_progress<O: Into<String>, S: Into<String>>(
        operation_type: O,
        state: S,
    ) -> Self {
        Self::OperationInProgress {
            operation_type: operation_type.into(),
            state: state.into(),
        }
    }

    /// Create an I/O error tagged with the path it happened on
    pub fn io<P: AsRef<std::path::Path>>(path: P, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
