use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::{sync::Mutex, task::JoinHandle, time};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::db::{AnalysisState, Database};
use crate::network::NetworkObserver;

use super::browser::{deserialize_dimension, Browser, Viewport, WindowInfo};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Viewport as requested by the popup, before validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ViewportRequest {
    #[serde(default, deserialize_with = "deserialize_dimension")]
    pub width: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_dimension")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RunOutcome {
    Completed,
    Stopped,
    Failed,
}

pub struct RunHandle {
    pub run_id: String,
    pub join: JoinHandle<RunOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunEnd {
    Settled,
    Finished,
    Stopped,
}

#[derive(Clone)]
struct ActiveRun {
    run_id: String,
    stop: CancellationToken,
    finish: CancellationToken,
    /// Cancelled once the observer is armed.
    observing: CancellationToken,
    /// Cancelled once the store holds the run's final state.
    wound_down: CancellationToken,
}

/// Drives one analysis run end to end: resize, reload, observe for a while,
/// then finalize and put the window back.
#[derive(Clone)]
pub struct AnalysisController {
    db: Database,
    browser: Arc<dyn Browser>,
    observer: NetworkObserver,
    settle_delay: Duration,
    active: Arc<Mutex<Option<ActiveRun>>>,
}

impl AnalysisController {
    pub fn new(
        db: Database,
        browser: Arc<dyn Browser>,
        observer: NetworkObserver,
        settle_delay: Duration,
    ) -> Self {
        Self {
            db,
            browser,
            observer,
            settle_delay,
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn observer(&self) -> &NetworkObserver {
        &self.observer
    }

    pub async fn is_active(&self) -> bool {
        self.active.lock().await.is_some()
    }

    pub async fn start(&self, request: ViewportRequest) -> Result<RunHandle> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            bail!("analysis already active");
        }

        let run_id = Uuid::new_v4().to_string();
        self.db
            .begin_analysis_run(&run_id)
            .await
            .context("failed to reset analysis store")?;

        let run = ActiveRun {
            run_id: run_id.clone(),
            stop: CancellationToken::new(),
            finish: CancellationToken::new(),
            observing: CancellationToken::new(),
            wound_down: CancellationToken::new(),
        };
        *active = Some(run.clone());
        drop(active);

        log_info!("starting analysis run {run_id}");
        let controller = self.clone();
        let join = tokio::spawn(async move { controller.run(run, request).await });

        Ok(RunHandle { run_id, join })
    }

    /// Ends the current run as stopped (the analysed tab lost focus).
    /// Returns false when no run was active.
    pub async fn stop(&self) -> bool {
        match self.active.lock().await.as_ref() {
            Some(run) => {
                log_info!("stopping analysis run {}", run.run_id);
                run.stop.cancel();
                true
            }
            None => false,
        }
    }

    /// Ends the current run early but as a normal completion.
    ///
    /// Once the run is observing, this returns only after the final flush
    /// and the `completed` state are in the store. The window restore that
    /// follows is not awaited: it needs a browser reply that the caller's
    /// read loop has yet to deliver.
    pub async fn finish_now(&self) -> bool {
        let run = match self.active.lock().await.as_ref() {
            Some(run) => {
                run.finish.cancel();
                run.clone()
            }
            None => return false,
        };

        if run.observing.is_cancelled() {
            run.wound_down.cancelled().await;
        }
        true
    }

    async fn run(self, run: ActiveRun, request: ViewportRequest) -> RunOutcome {
        let run_id = run.run_id.as_str();
        let original = match self.prepare(request).await {
            Ok(original) => original,
            Err(err) => {
                log_error!("analysis run {run_id} failed before observing: {err:?}");
                if let Err(err) = self.db.set_analysis_state(AnalysisState::Error).await {
                    log_warn!("failed to record analysis error: {err:?}");
                }
                run.wound_down.cancel();
                self.clear_active(run_id).await;
                return RunOutcome::Failed;
            }
        };

        self.observer.arm();
        run.observing.cancel();
        let end = tokio::select! {
            _ = time::sleep(self.settle_delay) => RunEnd::Settled,
            _ = run.finish.cancelled() => RunEnd::Finished,
            _ = run.stop.cancelled() => RunEnd::Stopped,
        };
        self.observer.teardown();

        let outcome = self.wind_down(end).await;
        run.wound_down.cancel();

        if let Err(err) = self.browser.restore_window(&original).await {
            log_warn!("failed to restore window {}: {err:?}", original.id);
        }

        self.clear_active(run_id).await;
        log_info!("analysis run {run_id} ended: {outcome:?}");
        outcome
    }

    async fn prepare(&self, request: ViewportRequest) -> Result<WindowInfo> {
        let viewport = Viewport::new(request.width, request.height)?;
        let original = self
            .browser
            .current_window()
            .await
            .context("failed to read current window")?;
        self.browser
            .resize_window(original.id, viewport)
            .await
            .with_context(|| format!("failed to resize window to {}x{}", viewport.width, viewport.height))?;
        self.browser
            .reload_active_tab()
            .await
            .context("failed to reload active tab")?;
        Ok(original)
    }

    async fn wind_down(&self, end: RunEnd) -> RunOutcome {
        let consumer = self.observer.dispatcher().consumer().await;

        if end == RunEnd::Stopped {
            if let Some(reconciler) = consumer {
                reconciler.flush().await;
            }
            if let Err(err) = self.db.set_analysis_state(AnalysisState::Stopped).await {
                log_warn!("failed to mark analysis stopped: {err:?}");
            }
            return RunOutcome::Stopped;
        }

        match consumer {
            Some(reconciler) => {
                reconciler.finalize().await;
            }
            None => {
                log_warn!("no page consumer attached at finalize; nothing to flush");
                if let Err(err) = self.db.set_analysis_state(AnalysisState::Completed).await {
                    log_warn!("failed to mark analysis completed: {err:?}");
                }
            }
        }
        RunOutcome::Completed
    }

    async fn clear_active(&self, run_id: &str) {
        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(|run| run.run_id == run_id) {
            *active = None;
        }
    }
}
