//! Centralized error handling for the EPG daemon
//!
//! # Error Categories
//!
//! - **Fetch Errors**: upstream download failures
//! - **Stage Errors**: conversion pipeline failures (parse, I/O, normalize, serialize)
//! - **Configuration Errors**: invalid or unreadable configuration
//!
//! # Usage
//!
//! ```rust
//! use movistar_xmltv::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Err(AppError::configuration("missing upstream url"))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;
