pub mod analysis;
pub mod correlate;
pub mod db;
pub mod efficiency;
pub mod host;
pub mod messages;
pub mod network;
pub mod reconciler;
pub mod settings;
mod utils;

use std::sync::Arc;

use anyhow::Context;
use log::warn;
use serde_json::Value;
use tokio::sync::mpsc;

use analysis::{AnalysisController, Browser};
use db::{AnalysisState, Database};
use host::{bridge::DEFAULT_REQUEST_TIMEOUT, ExtensionBridge};
use network::{Dispatcher, NetworkObserver};
use settings::{PipelineSettings, SettingsStore, SETTINGS_FILE};

/// Everything a message handler can reach for one extension connection.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub observer: NetworkObserver,
    pub analysis: AnalysisController,
    pub bridge: ExtensionBridge,
    pub pipeline: PipelineSettings,
}

impl AppState {
    /// Wires the pipeline with the extension itself as the browser.
    pub fn new(db: Database, pipeline: PipelineSettings, outbound: mpsc::UnboundedSender<Value>) -> Self {
        let bridge = ExtensionBridge::new(outbound, DEFAULT_REQUEST_TIMEOUT);
        let browser: Arc<dyn Browser> = Arc::new(bridge.clone());
        Self::with_browser(db, pipeline, bridge, browser)
    }

    pub fn with_browser(
        db: Database,
        pipeline: PipelineSettings,
        bridge: ExtensionBridge,
        browser: Arc<dyn Browser>,
    ) -> Self {
        let observer = NetworkObserver::new(Dispatcher::new(db.clone()));
        let analysis = AnalysisController::new(
            db.clone(),
            browser,
            observer.clone(),
            pipeline.settle_delay(),
        );

        Self {
            db,
            observer,
            analysis,
            bridge,
            pipeline,
        }
    }
}

pub fn run() {
    // Initialize logging (reads RUST_LOG env var). stdout carries frames, so
    // env_logger's stderr default must stay.
    let level = if settings::debug_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    log::info!("PixelWeight host starting up...");

    if let Err(err) = start_host() {
        log::error!("host exited with error: {err:?}");
        std::process::exit(1);
    }
}

fn start_host() -> anyhow::Result<()> {
    let data_dir = settings::data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let settings_store = SettingsStore::new(data_dir.join(SETTINGS_FILE))?;
    match settings_store.ensure_written() {
        Ok(true) => log::info!("Wrote default settings to {}", settings_store.path().display()),
        Ok(false) => {}
        Err(err) => warn!("Could not write default settings: {err:?}"),
    }
    let pipeline = settings_store.pipeline();
    let database = Database::new(data_dir.join(&pipeline.database_file))?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(async move {
        // A run left in progress by a host that died can never finish.
        if database.get_analysis_state().await? == AnalysisState::InProgress {
            warn!("Recovered interrupted analysis run; marking as stopped");
            database.set_analysis_state(AnalysisState::Stopped).await?;
        }

        host::serve(tokio::io::stdin(), tokio::io::stdout(), database, pipeline).await
    })
}
