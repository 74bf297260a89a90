use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::{sync::Mutex, time};
use tokio_util::sync::CancellationToken;

use crate::correlate::LiveDocument;
use crate::db::{AnalysisState, Database, ImageRecord, Observation};

use super::pass::{run_pass, RejectReason, MIN_IMAGE_BYTES};
use super::state::{ReconcilerPhase, ReconcilerState};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, Copy)]
pub struct ReconcilerConfig {
    pub debounce: Duration,
    pub min_image_bytes: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            min_image_bytes: MIN_IMAGE_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum FlushReport {
    /// Nothing was waiting; the store was not touched.
    Empty,
    Committed { accepted: usize, rejected: usize },
    /// Storage failed; the observations are still queued for the next trigger.
    Stalled { retained: usize },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcilerSnapshot {
    pub phase: ReconcilerPhase,
    pub queued: usize,
}

/// Debounced, single-flight reconciliation of observations into the store.
///
/// Arrivals are appended to the current batch. The first arrival of a cycle
/// arms a timer; when it fires the whole batch is flushed in one pass. At
/// most one flush runs at a time, and anything arriving while it runs waits
/// for the next cycle.
#[derive(Clone)]
pub struct BatchReconciler {
    state: Arc<Mutex<ReconcilerState>>,
    flush_gate: Arc<Mutex<()>>,
    db: Database,
    document: Arc<LiveDocument>,
    config: ReconcilerConfig,
}

impl BatchReconciler {
    pub fn new(db: Database, document: Arc<LiveDocument>, config: ReconcilerConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(ReconcilerState::new())),
            flush_gate: Arc::new(Mutex::new(())),
            db,
            document,
            config,
        }
    }

    pub fn document(&self) -> &Arc<LiveDocument> {
        &self.document
    }

    pub async fn snapshot(&self) -> ReconcilerSnapshot {
        let state = self.state.lock().await;
        ReconcilerSnapshot {
            phase: state.phase,
            queued: state.batch.len(),
        }
    }

    pub async fn accept(&self, observation: Observation) {
        log_debug!("received image observation {} ({})", observation.url, observation.size);
        let mut state = self.state.lock().await;
        if state.push(observation) {
            self.arm_debounce(&mut state);
        }
    }

    pub async fn accept_all(&self, observations: Vec<Observation>) {
        if observations.is_empty() {
            return;
        }
        let mut state = self.state.lock().await;
        let mut needs_timer = false;
        for observation in observations {
            needs_timer |= state.push(observation);
        }
        if needs_timer {
            self.arm_debounce(&mut state);
        }
    }

    /// Moves everything in the pending queue into the current batch.
    /// Storage failures are logged and leave the queue for a later check.
    pub async fn drain_pending(&self) -> usize {
        match self.db.drain_pending_images().await {
            Ok(pending) => {
                let count = pending.len();
                if count > 0 {
                    log_info!("drained {count} pending image observations");
                }
                self.accept_all(pending).await;
                count
            }
            Err(err) => {
                log_warn!("pending image drain failed: {err:?}");
                0
            }
        }
    }

    /// Runs one flush now. Waits for a flush already in progress first.
    pub async fn flush(&self) -> FlushReport {
        let _gate = self.flush_gate.lock().await;
        let batch = {
            let mut state = self.state.lock().await;
            state.begin_flush()
        };
        self.run_flush(batch).await
    }

    /// Flushes whatever is left, then marks the analysis completed.
    pub async fn finalize(&self) -> FlushReport {
        let report = self.flush().await;
        log_info!("finalizing analysis after flush: {report:?}");
        if let Err(err) = self.db.set_analysis_state(AnalysisState::Completed).await {
            log_warn!("failed to mark analysis completed: {err:?}");
        }
        report
    }

    fn arm_debounce(&self, state: &mut ReconcilerState) {
        let token = CancellationToken::new();
        state.debounce = Some(token.clone());

        let reconciler = self.clone();
        let delay = self.config.debounce;
        tokio::spawn(async move {
            tokio::select! {
                _ = time::sleep(delay) => {}
                _ = token.cancelled() => return,
            }
            reconciler.flush_from_timer(token).await;
        });
    }

    async fn flush_from_timer(&self, token: CancellationToken) {
        let _gate = self.flush_gate.lock().await;
        let batch = {
            let mut state = self.state.lock().await;
            // Someone else flushed (and cancelled us) while we waited.
            if token.is_cancelled() {
                return;
            }
            state.begin_flush()
        };
        self.run_flush(batch).await;
    }

    async fn run_flush(&self, batch: Option<Vec<Observation>>) -> FlushReport {
        let Some(batch) = batch else {
            return FlushReport::Empty;
        };

        log_info!("processing batch of {} images", batch.len());
        match self.commit_batch(&batch).await {
            Ok((accepted, rejected)) => {
                let mut state = self.state.lock().await;
                if state.finish_flush() {
                    self.arm_debounce(&mut state);
                }
                FlushReport::Committed { accepted, rejected }
            }
            Err(err) => {
                log_warn!("batch flush failed, keeping {} observations: {err:?}", batch.len());
                let retained = batch.len();
                let mut state = self.state.lock().await;
                state.abort_flush(batch);
                FlushReport::Stalled { retained }
            }
        }
    }

    async fn commit_batch(&self, batch: &[Observation]) -> Result<(usize, usize)> {
        let committed = self
            .db
            .committed_image_urls()
            .await
            .context("failed to load committed image urls")?;

        let document = self.document.snapshot();
        let outcome = run_pass(batch, &committed, self.config.min_image_bytes, document.as_ref());

        for rejection in &outcome.rejected {
            match rejection.reason {
                RejectReason::AlreadyCommitted | RejectReason::DuplicateInBatch => {
                    log_debug!("skipping duplicate image: {}", rejection.url)
                }
                RejectReason::UnresolvedSize => {
                    log_info!("skipping image with unknown size: {}", rejection.url)
                }
                RejectReason::BelowMinimum => {
                    log_debug!("skipping small image: {}", rejection.url)
                }
            }
        }

        let accepted = outcome.accepted.len();
        let rejected = outcome.rejected.len();
        if accepted == 0 {
            log_info!("no new images to store in this batch");
            return Ok((0, rejected));
        }

        self.store(outcome.accepted).await?;
        log_info!("stored batch of {accepted} processed images");
        Ok((accepted, rejected))
    }

    async fn store(&self, records: Vec<ImageRecord>) -> Result<()> {
        self.db
            .commit_image_records(records)
            .await
            .map(|_| ())
            .context("failed to commit image batch")
    }
}
