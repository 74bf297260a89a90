use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use pixelweight_lib::{
    analysis::{Browser, Viewport, WindowInfo, WindowState},
    db::{AnalysisState, Database},
    host::{bridge::DEFAULT_REQUEST_TIMEOUT, handle_message, ExtensionBridge},
    messages::Envelope,
    settings::PipelineSettings,
    AppState,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// Answers every window request at once with a fixed window.
struct InstantBrowser;

fn desktop_window() -> WindowInfo {
    WindowInfo {
        id: 1,
        state: WindowState::Normal,
        width: 1440,
        height: 900,
        left: 0,
        top: 0,
    }
}

#[async_trait]
impl Browser for InstantBrowser {
    async fn current_window(&self) -> Result<WindowInfo> {
        Ok(desktop_window())
    }

    async fn resize_window(&self, _window_id: i64, _viewport: Viewport) -> Result<WindowInfo> {
        Ok(desktop_window())
    }

    async fn restore_window(&self, original: &WindowInfo) -> Result<WindowInfo> {
        Ok(original.clone())
    }

    async fn reload_active_tab(&self) -> Result<()> {
        Ok(())
    }
}

fn app() -> (AppState, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let db = Database::in_memory().unwrap();
    (AppState::new(db, PipelineSettings::default(), tx), rx)
}

async fn send(state: &AppState, message: Value) -> Value {
    let envelope: Envelope = serde_json::from_value(message).unwrap();
    handle_message(state, envelope.message)
        .await
        .into_frame(envelope.id)
        .unwrap()
}

async fn log_image(state: &AppState, url: &str, size: Value) -> Value {
    send(
        state,
        json!({
            "action": "logImageData",
            "imageData": {"url": url, "size": size, "type": "image/png"}
        }),
    )
    .await
}

fn stored_urls(surface: &Value) -> Vec<String> {
    surface["imageData"]
        .as_array()
        .unwrap()
        .iter()
        .map(|record| record["url"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn small_images_are_dropped() {
    let (state, _rx) = app();
    send(&state, json!({"action": "contentReady", "elements": []})).await;

    log_image(&state, "a.png", json!(500)).await;
    log_image(&state, "b.png", json!(2000)).await;
    assert_eq!(
        send(&state, json!({"action": "stopAnalysis"})).await,
        json!({"stopped": true})
    );

    let surface = send(&state, json!({"action": "getState"})).await;
    assert_eq!(stored_urls(&surface), vec!["b.png"]);
    assert_eq!(surface["analysisState"], "completed");
}

#[tokio::test]
async fn duplicates_in_one_batch_store_once() {
    let (state, _rx) = app();
    send(&state, json!({"action": "contentReady"})).await;

    log_image(&state, "c.png", json!(3000)).await;
    log_image(&state, "c.png", json!(3000)).await;
    send(&state, json!({"action": "stopAnalysis"})).await;

    let surface = send(&state, json!({"action": "getState"})).await;
    assert_eq!(stored_urls(&surface), vec!["c.png"]);
}

#[tokio::test]
async fn already_committed_url_is_not_stored_again() {
    let (state, _rx) = app();
    send(&state, json!({"action": "contentReady"})).await;

    log_image(&state, "d.png", json!(4000)).await;
    send(&state, json!({"action": "stopAnalysis"})).await;
    assert_eq!(state.db.count_image_records().await.unwrap(), 1);

    log_image(&state, "d.png", json!(4000)).await;
    send(&state, json!({"action": "stopAnalysis"})).await;
    assert_eq!(state.db.count_image_records().await.unwrap(), 1);
}

#[tokio::test]
async fn unknown_size_never_reaches_store_or_queue() {
    let (state, _rx) = app();
    state.observer.arm();

    let reply = send(
        &state,
        json!({
            "action": "headersReceived",
            "details": {
                "url": "https://a.test/mystery.png",
                "type": "image",
                "responseHeaders": [{"name": "Content-Type", "value": "image/png"}]
            }
        }),
    )
    .await;
    assert_eq!(reply, json!({"cancel": false}));

    let surface = send(&state, json!({"action": "getState"})).await;
    assert!(surface["imageData"].as_array().unwrap().is_empty());
    assert!(surface["pendingImages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn observations_before_page_ready_wait_in_pending_queue() {
    let (state, _rx) = app();
    state.observer.arm();

    let reply = send(
        &state,
        json!({
            "id": "h1",
            "action": "headersReceived",
            "details": {
                "url": "https://a.test/early.jpg",
                "type": "image",
                "responseHeaders": [
                    {"name": "content-length", "value": "8000"},
                    {"name": "content-type", "value": "image/jpeg"}
                ]
            }
        }),
    )
    .await;
    assert_eq!(reply, json!({"cancel": false, "id": "h1"}));
    log_image(&state, "https://a.test/early.png", json!("6000")).await;

    let surface = send(&state, json!({"action": "getState"})).await;
    assert_eq!(surface["pendingImages"].as_array().unwrap().len(), 2);
    assert_eq!(surface["pendingImages"][0]["size"], 8000);

    assert_eq!(
        send(&state, json!({"action": "checkPendingImages"})).await,
        json!({"drained": 0})
    );
    assert_eq!(
        send(&state, json!({"action": "contentReady"})).await,
        json!({"drained": 2})
    );
    send(&state, json!({"action": "stopAnalysis"})).await;

    let surface = send(&state, json!({"action": "getState"})).await;
    assert_eq!(
        stored_urls(&surface),
        vec!["https://a.test/early.jpg", "https://a.test/early.png"]
    );
    assert!(surface["pendingImages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn report_grades_correlated_images() {
    let (state, _rx) = app();
    send(
        &state,
        json!({
            "action": "contentReady",
            "elements": [
                {"tag": "IMG", "src": "https://a.test/thumb.webp", "offsetWidth": 100, "offsetHeight": 100},
                {"tag": "DIV", "backgroundImage": "url(\"https://a.test/bg.png\")", "offsetWidth": 50, "offsetHeight": 50}
            ]
        }),
    )
    .await;

    log_image(&state, "https://a.test/thumb.webp", json!(2000)).await;
    log_image(&state, "https://a.test/bg.png", json!(20000)).await;
    send(&state, json!({"action": "stopAnalysis"})).await;

    let report = send(&state, json!({"action": "getReport"})).await;
    let images = report["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0]["elementTag"], "IMG");
    assert_eq!(images[0]["grade"], "A");
    assert_eq!(images[1]["elementTag"], "DIV");
    assert_eq!(images[1]["grade"], "F");
    assert_eq!(report["distribution"]["totalBytes"], 22000);
}

#[tokio::test]
async fn tab_switch_marks_stale_run_stopped() {
    let (state, _rx) = app();
    state
        .db
        .set_analysis_state(AnalysisState::InProgress)
        .await
        .unwrap();

    assert_eq!(
        send(&state, json!({"action": "tabActivated"})).await,
        json!({"stopped": true})
    );
    assert_eq!(
        state.db.get_analysis_state().await.unwrap(),
        AnalysisState::Stopped
    );

    assert_eq!(
        send(&state, json!({"action": "tabActivated"})).await,
        json!({"received": true})
    );
}

#[tokio::test]
async fn invalid_dimensions_end_in_error() {
    let (state, mut rx) = app();
    let reply = send(
        &state,
        json!({"action": "sustainable-analysis", "width": "wide", "height": 667}),
    )
    .await;
    assert_eq!(reply["started"], true);

    let mut analysis_state = Value::Null;
    for _ in 0..50 {
        let surface = send(&state, json!({"action": "getState"})).await;
        analysis_state = surface["analysisState"].clone();
        if analysis_state == "error" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(analysis_state, "error");
    // Validation failed before any browser call went out.
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn document_snapshot_updates_correlation() {
    let (state, _rx) = app();
    send(&state, json!({"action": "contentReady"})).await;
    send(
        &state,
        json!({
            "action": "documentSnapshot",
            "elements": [{"tag": "IMG", "currentSrc": "https://a.test/late.jpg", "offsetWidth": 300, "offsetHeight": 200}]
        }),
    )
    .await;

    log_image(&state, "https://a.test/late.jpg", json!(30000)).await;
    send(&state, json!({"action": "contentUnloaded"})).await;

    let records = state.db.get_image_records().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].element_width, Some(300));
    assert!(state.observer.dispatcher().consumer().await.is_none());
}

#[tokio::test]
async fn markup_snapshot_correlates_when_no_elements_are_sent() {
    let (state, _rx) = app();
    send(
        &state,
        json!({
            "action": "contentReady",
            "html": "<html><body><img src=\"https://a.test/hero.jpg\" width=\"400\" height=\"250\"></body></html>"
        }),
    )
    .await;

    log_image(&state, "https://a.test/hero.jpg", json!(20000)).await;
    send(&state, json!({"action": "stopAnalysis"})).await;

    let records = state.db.get_image_records().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].element_tag.as_deref(), Some("IMG"));
    assert_eq!((records[0].element_width, records[0].element_height), (Some(400), Some(250)));
}

#[tokio::test]
async fn stop_during_run_acks_after_store_is_completed() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let db = Database::in_memory().unwrap();
    let pipeline = PipelineSettings {
        settle_delay_ms: 30_000,
        ..PipelineSettings::default()
    };
    let bridge = ExtensionBridge::new(tx, DEFAULT_REQUEST_TIMEOUT);
    let state = AppState::with_browser(db, pipeline, bridge, Arc::new(InstantBrowser));

    send(&state, json!({"action": "contentReady", "elements": []})).await;
    let reply = send(
        &state,
        json!({"action": "sustainable-analysis", "width": 375, "height": 667}),
    )
    .await;
    assert_eq!(reply["started"], true);
    while !state.observer.is_armed() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    log_image(&state, "x.png", json!(5000)).await;
    assert_eq!(
        send(&state, json!({"action": "stopAnalysis"})).await,
        json!({"stopped": true})
    );

    assert_eq!(
        state.db.get_analysis_state().await.unwrap(),
        AnalysisState::Completed
    );
    let surface = send(&state, json!({"action": "getState"})).await;
    assert_eq!(stored_urls(&surface), vec!["x.png"]);
}
