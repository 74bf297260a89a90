use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use serde::{Deserialize, Serialize};

use crate::db::{Observation, ObservedSize};

use super::dispatch::{DispatchOutcome, Dispatcher};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHeader {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// The subset of a `webRequest.onHeadersReceived` event the observer reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDetails {
    pub url: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub response_headers: Option<Vec<HttpHeader>>,
}

impl ResponseDetails {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.response_headers
            .as_deref()?
            .iter()
            .find(|header| header.name.eq_ignore_ascii_case(name))
            .and_then(|header| header.value.as_deref())
            .filter(|value| !value.is_empty())
    }

    pub fn is_image(&self) -> bool {
        self.resource_type == "image"
    }
}

/// Reply to the listener. The observer is a read-only tap: it never cancels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingResponse {
    pub cancel: bool,
}

impl BlockingResponse {
    pub const ALLOW: BlockingResponse = BlockingResponse { cancel: false };
}

/// Builds the observation for an image response, if this is one.
///
/// A missing content-length leaves the size unresolved rather than guessing
/// it; a missing content-type becomes `"unknown"`.
pub fn observe(details: &ResponseDetails) -> Option<Observation> {
    if !details.is_image() {
        return None;
    }

    let size = details
        .header("content-length")
        .map(ObservedSize::from_header)
        .unwrap_or(ObservedSize::Unknown);
    let mime_type = details
        .header("content-type")
        .unwrap_or(Observation::unknown_mime_type());

    Some(Observation::new(details.url.clone(), size, mime_type))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ObserverEvent {
    Ignored,
    UnknownSize,
    Dispatched(DispatchOutcome),
}

/// Network tap for image responses. Events are only turned into observations
/// while the observer is armed.
#[derive(Clone)]
pub struct NetworkObserver {
    armed: Arc<AtomicBool>,
    dispatcher: Dispatcher,
}

impl NetworkObserver {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            armed: Arc::new(AtomicBool::new(false)),
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn arm(&self) {
        if !self.armed.swap(true, Ordering::SeqCst) {
            log_info!("image listener has been set up");
        }
    }

    pub fn teardown(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            log_info!("image listener removed");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    pub async fn on_headers_received(&self, details: &ResponseDetails) -> (BlockingResponse, ObserverEvent) {
        if !self.is_armed() {
            return (BlockingResponse::ALLOW, ObserverEvent::Ignored);
        }

        let Some(observation) = observe(details) else {
            return (BlockingResponse::ALLOW, ObserverEvent::Ignored);
        };

        if !observation.size.is_resolved() {
            log_info!("image detected but size unknown: {}", observation.url);
            return (BlockingResponse::ALLOW, ObserverEvent::UnknownSize);
        }

        log_debug!("observed image {} ({} bytes)", observation.url, observation.size);
        let outcome = self.dispatcher.dispatch(observation).await;
        (BlockingResponse::ALLOW, ObserverEvent::Dispatched(outcome))
    }
}
