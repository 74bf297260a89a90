use std::sync::Arc;

use crate::{
    analysis::ViewportRequest,
    correlate::{DocumentSnapshot, ElementSnapshot, LiveDocument},
    db::{AnalysisState, Observation},
    efficiency::AnalysisReport,
    messages::{InboundMessage, Reply},
    network::ResponseDetails,
    reconciler::BatchReconciler,
    AppState,
};

use super::bridge::BrowserReply;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub async fn handle_message(state: &AppState, message: InboundMessage) -> Reply {
    match message {
        InboundMessage::SustainableAnalysis(request) => start_analysis(state, request).await,
        InboundMessage::HeadersReceived { details } => headers_received(state, details).await,
        InboundMessage::LogImageData { image_data } => log_image_data(state, image_data).await,
        InboundMessage::StopAnalysis => stop_analysis(state).await,
        InboundMessage::CheckPendingImages => check_pending_images(state).await,
        InboundMessage::ContentReady { elements, html } => {
            content_ready(state, page_snapshot(elements, html)).await
        }
        InboundMessage::DocumentSnapshot { elements, html } => {
            document_snapshot(state, page_snapshot(elements, html)).await
        }
        InboundMessage::ContentUnloaded => content_unloaded(state).await,
        InboundMessage::TabActivated => tab_activated(state).await,
        InboundMessage::GetState => get_state(state).await,
        InboundMessage::GetReport => get_report(state).await,
        InboundMessage::BrowserReply {
            request_id,
            ok,
            window,
            error,
        } => {
            state
                .bridge
                .resolve(&request_id, BrowserReply { ok, window, error })
                .await;
            Reply::received()
        }
    }
}

pub async fn start_analysis(state: &AppState, request: ViewportRequest) -> Reply {
    match state.analysis.start(request).await {
        Ok(handle) => Reply::Started {
            started: true,
            run_id: handle.run_id,
        },
        Err(err) => Reply::error(err),
    }
}

pub async fn headers_received(state: &AppState, details: ResponseDetails) -> Reply {
    let (response, _) = state.observer.on_headers_received(&details).await;
    Reply::Blocking(response)
}

pub async fn log_image_data(state: &AppState, observation: Observation) -> Reply {
    if !observation.size.is_resolved() {
        log_info!("image detected but size unknown: {}", observation.url);
        return Reply::received();
    }
    state.observer.dispatcher().dispatch(observation).await;
    Reply::received()
}

/// Manual stop from the popup: finish the run now, as a completion.
pub async fn stop_analysis(state: &AppState) -> Reply {
    if state.analysis.finish_now().await {
        return Reply::stopped();
    }

    match state.observer.dispatcher().consumer().await {
        Some(reconciler) => {
            reconciler.finalize().await;
        }
        None => {
            if let Err(err) = state.db.set_analysis_state(AnalysisState::Completed).await {
                return Reply::error(err);
            }
        }
    }
    Reply::stopped()
}

pub async fn check_pending_images(state: &AppState) -> Reply {
    let drained = match state.observer.dispatcher().consumer().await {
        Some(reconciler) => reconciler.drain_pending().await,
        None => 0,
    };
    Reply::Drained { drained }
}

/// Element lists from the page win; raw markup is the fallback for pages
/// that could only send their HTML.
fn page_snapshot(elements: Vec<ElementSnapshot>, html: Option<String>) -> DocumentSnapshot {
    match html {
        Some(markup) if elements.is_empty() => DocumentSnapshot::from_html(&markup),
        _ => DocumentSnapshot::new(elements),
    }
}

/// A fresh page context: new live document, new reconciler, then pull in
/// whatever was queued while nobody was listening.
pub async fn content_ready(state: &AppState, snapshot: DocumentSnapshot) -> Reply {
    let document = Arc::new(LiveDocument::new());
    document.replace(snapshot);

    let reconciler = BatchReconciler::new(
        state.db.clone(),
        document,
        state.pipeline.reconciler_config(),
    );
    state.observer.dispatcher().attach(reconciler.clone()).await;
    log_info!("page consumer attached");

    let drained = reconciler.drain_pending().await;
    Reply::Drained { drained }
}

pub async fn document_snapshot(state: &AppState, snapshot: DocumentSnapshot) -> Reply {
    match state.observer.dispatcher().consumer().await {
        Some(reconciler) => reconciler.document().replace(snapshot),
        None => log_warn!("document snapshot with no page consumer attached"),
    }
    Reply::received()
}

pub async fn content_unloaded(state: &AppState) -> Reply {
    if let Some(reconciler) = state.observer.dispatcher().detach().await {
        log_info!("page consumer detached, flushing what it held");
        reconciler.flush().await;
    }
    Reply::received()
}

/// The user switched tabs. An active run ends as stopped; a run left
/// in progress by an earlier host process is marked stopped too.
pub async fn tab_activated(state: &AppState) -> Reply {
    if state.analysis.stop().await {
        return Reply::stopped();
    }

    match state.db.get_analysis_state().await {
        Ok(AnalysisState::InProgress) => {
            if let Err(err) = state.db.set_analysis_state(AnalysisState::Stopped).await {
                return Reply::error(err);
            }
            Reply::stopped()
        }
        Ok(_) => Reply::received(),
        Err(err) => Reply::error(err),
    }
}

pub async fn get_state(state: &AppState) -> Reply {
    match state.db.get_state_surface().await {
        Ok(surface) => Reply::State(surface),
        Err(err) => Reply::error(err),
    }
}

pub async fn get_report(state: &AppState) -> Reply {
    match state.db.get_image_records().await {
        Ok(records) => Reply::Report(AnalysisReport::from_records(&records)),
        Err(err) => Reply::error(err),
    }
}
