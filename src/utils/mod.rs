//! Utility modules shared across the daemon

pub mod human_format;
pub mod time;
