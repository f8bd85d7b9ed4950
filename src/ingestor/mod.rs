//! Daily refresh orchestration
//!
//! [`CycleScheduler`] drives the cycle state machine; [`monitor`] carries the
//! pipeline's completion back to it.

pub mod monitor;
pub mod scheduler;

pub use monitor::{CompletionMonitor, CompletionSignal, Settlement, completion_channel};
pub use scheduler::{Clock, CycleScheduler, SystemClock};
