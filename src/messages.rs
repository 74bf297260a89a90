//! Wire messages exchanged with the extension over native messaging.
//!
//! Inbound frames are tagged by `action`. Replies are plain JSON objects
//! shaped the way the extension's callbacks expect them. Frames the host
//! originates on its own (browser requests, notifications) are tagged by
//! `type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::{ViewportRequest, WindowInfo};
use crate::correlate::ElementSnapshot;
use crate::db::{ImageRecord, Observation, StateSurface};
use crate::efficiency::AnalysisReport;
use crate::network::{BlockingResponse, ResponseDetails};

/// One inbound frame. `id`, when present, is echoed on the reply.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(flatten)]
    pub message: InboundMessage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum InboundMessage {
    /// Popup asks for a run at the given viewport.
    #[serde(rename = "sustainable-analysis")]
    SustainableAnalysis(ViewportRequest),
    HeadersReceived {
        details: ResponseDetails,
    },
    /// An observation forwarded by the extension's own background context.
    LogImageData {
        #[serde(rename = "imageData")]
        image_data: Observation,
    },
    StopAnalysis,
    CheckPendingImages,
    /// The page context is up; its element list seeds the live document.
    ContentReady {
        #[serde(default)]
        elements: Vec<ElementSnapshot>,
        /// Serialized markup, read only when `elements` is empty.
        #[serde(default)]
        html: Option<String>,
    },
    DocumentSnapshot {
        #[serde(default)]
        elements: Vec<ElementSnapshot>,
        #[serde(default)]
        html: Option<String>,
    },
    ContentUnloaded,
    TabActivated,
    GetState,
    GetReport,
    BrowserReply {
        #[serde(rename = "requestId")]
        request_id: String,
        ok: bool,
        #[serde(default)]
        window: Option<WindowInfo>,
        #[serde(default)]
        error: Option<String>,
    },
}

impl InboundMessage {
    pub fn action(&self) -> &'static str {
        match self {
            InboundMessage::SustainableAnalysis(_) => "sustainable-analysis",
            InboundMessage::HeadersReceived { .. } => "headersReceived",
            InboundMessage::LogImageData { .. } => "logImageData",
            InboundMessage::StopAnalysis => "stopAnalysis",
            InboundMessage::CheckPendingImages => "checkPendingImages",
            InboundMessage::ContentReady { .. } => "contentReady",
            InboundMessage::DocumentSnapshot { .. } => "documentSnapshot",
            InboundMessage::ContentUnloaded => "contentUnloaded",
            InboundMessage::TabActivated => "tabActivated",
            InboundMessage::GetState => "getState",
            InboundMessage::GetReport => "getReport",
            InboundMessage::BrowserReply { .. } => "browserReply",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Received {
        received: bool,
    },
    Stopped {
        stopped: bool,
    },
    Drained {
        drained: usize,
    },
    Blocking(BlockingResponse),
    State(StateSurface),
    Report(AnalysisReport),
    Started {
        started: bool,
        #[serde(rename = "runId")]
        run_id: String,
    },
    Error {
        error: String,
    },
}

impl Reply {
    pub fn received() -> Self {
        Reply::Received { received: true }
    }

    pub fn stopped() -> Self {
        Reply::Stopped { stopped: true }
    }

    pub fn error(err: impl std::fmt::Display) -> Self {
        Reply::Error {
            error: err.to_string(),
        }
    }

    /// JSON form of the reply with the caller's `id` attached.
    pub fn into_frame(self, id: Option<Value>) -> serde_json::Result<Value> {
        let mut value = serde_json::to_value(self)?;
        if let (Some(id), Value::Object(map)) = (id, &mut value) {
            map.insert("id".into(), id);
        }
        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum BrowserCommand {
    GetWindow,
    ResizeWindow {
        #[serde(rename = "windowId")]
        window_id: i64,
        width: u32,
        height: u32,
    },
    RestoreWindow {
        window: WindowInfo,
    },
    /// Scroll to top, then reload bypassing the cache.
    ReloadTab,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrowserRequest {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(rename = "requestId")]
    pub request_id: String,
    #[serde(flatten)]
    pub command: BrowserCommand,
}

impl BrowserRequest {
    pub fn new(request_id: String, command: BrowserCommand) -> Self {
        Self {
            kind: "browserRequest",
            request_id,
            command,
        }
    }
}

/// Sent when the popup's chart selects an image. Nothing in the host
/// produces it on its own.
#[derive(Debug, Clone, Serialize)]
pub struct ImageSelected {
    #[serde(rename = "type")]
    kind: &'static str,
    pub image: ImageRecord,
}

impl ImageSelected {
    pub fn new(image: ImageRecord) -> Self {
        Self {
            kind: "imageSelected",
            image,
        }
    }
}
