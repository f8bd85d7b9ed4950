//! Completion signalling between the pipeline task and the scheduler
//!
//! The pipeline task owns a [`CompletionSignal`] and settles it once; the
//! scheduler awaits the matching [`CompletionMonitor`]. Settling consumes the
//! signal, so a second settlement cannot be expressed.

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::models::{CycleOutcome, CycleState, Metrics};

/// Terminal report of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub outcome: CycleOutcome,
    pub metrics: Metrics,
}

/// Sending half, held by the pipeline task
#[derive(Debug)]
pub struct CompletionSignal {
    sender: oneshot::Sender<Settlement>,
}

/// Receiving half, awaited by the scheduler
#[derive(Debug)]
pub struct CompletionMonitor {
    receiver: oneshot::Receiver<Settlement>,
}

pub fn completion_channel() -> (CompletionSignal, CompletionMonitor) {
    let (sender, receiver) = oneshot::channel();
    (CompletionSignal { sender }, CompletionMonitor { receiver })
}

impl CompletionSignal {
    pub fn settle(self, outcome: CycleOutcome, metrics: Metrics) {
        if self.sender.send(Settlement { outcome, metrics }).is_err() {
            // Monitor dropped, scheduler is shutting down
            debug!("Completion monitor gone, settlement {:?} discarded", outcome);
        }
    }
}

impl CompletionMonitor {
    /// Wait for the pipeline to settle
    ///
    /// A signal dropped without settling counts as a failed cycle.
    pub async fn await_settlement(self) -> (CycleState, Metrics) {
        match self.receiver.await {
            Ok(settlement) => (CycleState::Settled(settlement.outcome), settlement.metrics),
            Err(_) => {
                warn!("Pipeline task ended without reporting completion");
                (CycleState::Settled(CycleOutcome::Failed), Metrics::default())
            }
        }
    }
}
