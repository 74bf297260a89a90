use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::db::{Database, Observation};
use crate::reconciler::BatchReconciler;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DispatchOutcome {
    /// Handed straight to the attached reconciler.
    Delivered,
    /// No consumer yet; parked in the pending queue.
    Queued,
    /// Neither path worked. Logged and otherwise ignored.
    Dropped,
}

/// Routes observations to the page-side consumer.
///
/// The consumer attaches once the page context is ready and detaches when it
/// goes away. Until then observations go to the durable pending queue, which
/// the consumer drains on its own schedule.
#[derive(Clone)]
pub struct Dispatcher {
    consumer: Arc<RwLock<Option<BatchReconciler>>>,
    db: Database,
}

impl Dispatcher {
    pub fn new(db: Database) -> Self {
        Self {
            consumer: Arc::new(RwLock::new(None)),
            db,
        }
    }

    pub async fn attach(&self, reconciler: BatchReconciler) {
        *self.consumer.write().await = Some(reconciler);
    }

    pub async fn detach(&self) -> Option<BatchReconciler> {
        self.consumer.write().await.take()
    }

    pub async fn consumer(&self) -> Option<BatchReconciler> {
        self.consumer.read().await.clone()
    }

    pub async fn dispatch(&self, observation: Observation) -> DispatchOutcome {
        if let Some(reconciler) = self.consumer().await {
            reconciler.accept(observation).await;
            return DispatchOutcome::Delivered;
        }

        match self.db.enqueue_pending_image(&observation).await {
            Ok(()) => {
                log_debug!("consumer not ready, queued {}", observation.url);
                DispatchOutcome::Queued
            }
            Err(err) => {
                log_warn!("error queueing image data for {}: {err:?}", observation.url);
                DispatchOutcome::Dropped
            }
        }
    }
}
