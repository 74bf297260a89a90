use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::db::Observation;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ReconcilerPhase {
    #[default]
    Idle,
    Accumulating,
    Flushing,
}

/// Mutable reconciler state, always accessed under the controller's lock.
#[derive(Debug, Default)]
pub struct ReconcilerState {
    pub phase: ReconcilerPhase,
    /// Observations waiting for the next flush. While a flush runs this only
    /// holds arrivals for the following cycle.
    pub batch: Vec<Observation>,
    /// Armed debounce timer, if any. Cancelling it stops the pending flush.
    pub debounce: Option<CancellationToken>,
}

impl ReconcilerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an arrival. Returns true when the caller must arm a debounce
    /// timer: the first observation of a cycle, or the first one after a
    /// stalled flush left no timer behind.
    pub fn push(&mut self, observation: Observation) -> bool {
        self.batch.push(observation);
        match self.phase {
            ReconcilerPhase::Idle => {
                self.phase = ReconcilerPhase::Accumulating;
                true
            }
            ReconcilerPhase::Accumulating => self.debounce.is_none(),
            ReconcilerPhase::Flushing => false,
        }
    }

    /// Takes the batch for flushing, or `None` when there is nothing to do.
    pub fn begin_flush(&mut self) -> Option<Vec<Observation>> {
        if let Some(token) = self.debounce.take() {
            token.cancel();
        }

        if self.batch.is_empty() {
            self.phase = ReconcilerPhase::Idle;
            return None;
        }

        self.phase = ReconcilerPhase::Flushing;
        Some(std::mem::take(&mut self.batch))
    }

    /// Ends a successful flush. Returns true when arrivals queued up during
    /// the flush and the next cycle needs a timer.
    pub fn finish_flush(&mut self) -> bool {
        if self.batch.is_empty() {
            self.phase = ReconcilerPhase::Idle;
            false
        } else {
            self.phase = ReconcilerPhase::Accumulating;
            self.debounce.is_none()
        }
    }

    /// Ends a flush whose storage step failed: the flushed observations go
    /// back in front of anything that arrived meanwhile, and the reconciler
    /// waits for the next trigger.
    pub fn abort_flush(&mut self, mut flushed: Vec<Observation>) {
        flushed.append(&mut self.batch);
        self.batch = flushed;
        self.phase = ReconcilerPhase::Accumulating;
    }
}
