use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::{
    sync::{mpsc, oneshot, Mutex},
    time,
};
use uuid::Uuid;

use crate::analysis::{Browser, Viewport, WindowInfo};
use crate::messages::{BrowserCommand, BrowserRequest};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserReply {
    pub ok: bool,
    pub window: Option<WindowInfo>,
    pub error: Option<String>,
}

/// [`Browser`] backed by the extension: each call becomes an outbound
/// request frame and waits for the `browserReply` carrying its id.
#[derive(Clone)]
pub struct ExtensionBridge {
    outbound: mpsc::UnboundedSender<Value>,
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<BrowserReply>>>>,
    closed: Arc<AtomicBool>,
    timeout: Duration,
}

impl ExtensionBridge {
    pub fn new(outbound: mpsc::UnboundedSender<Value>, timeout: Duration) -> Self {
        Self {
            outbound,
            pending: Arc::new(Mutex::new(HashMap::new())),
            closed: Arc::new(AtomicBool::new(false)),
            timeout,
        }
    }

    /// Hands a reply to whoever is waiting on `request_id`. Returns false
    /// for unknown or already-expired ids.
    pub async fn resolve(&self, request_id: &str, reply: BrowserReply) -> bool {
        let Some(waiter) = self.pending.lock().await.remove(request_id) else {
            log_warn!("browser reply for unknown request {request_id}");
            return false;
        };
        waiter.send(reply).is_ok()
    }

    pub async fn pending_requests(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// No more replies will arrive. Waiting calls fail now, later ones at once.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let abandoned = {
            let mut pending = self.pending.lock().await;
            let count = pending.len();
            pending.clear();
            count
        };
        if abandoned > 0 {
            log_debug!("abandoned {abandoned} browser requests on close");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn call(&self, command: BrowserCommand) -> Result<BrowserReply> {
        let request_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            if self.is_closed() {
                bail!("extension connection closed");
            }
            pending.insert(request_id.clone(), tx);
        }

        let request = BrowserRequest::new(request_id.clone(), command);
        log_debug!("browser request {request_id}: {:?}", request.command);
        let frame = serde_json::to_value(&request).context("failed to encode browser request")?;
        if self.outbound.send(frame).is_err() {
            self.pending.lock().await.remove(&request_id);
            bail!("extension connection closed");
        }

        let reply = match time::timeout(self.timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => bail!("browser request {request_id} was abandoned"),
            Err(_) => {
                self.pending.lock().await.remove(&request_id);
                bail!("browser request {request_id} timed out");
            }
        };

        if !reply.ok {
            return Err(anyhow!(reply
                .error
                .unwrap_or_else(|| "browser request failed".to_string())));
        }
        Ok(reply)
    }

    async fn call_for_window(&self, command: BrowserCommand) -> Result<WindowInfo> {
        self.call(command)
            .await?
            .window
            .context("browser reply carried no window")
    }
}

#[async_trait]
impl Browser for ExtensionBridge {
    async fn current_window(&self) -> Result<WindowInfo> {
        self.call_for_window(BrowserCommand::GetWindow).await
    }

    async fn resize_window(&self, window_id: i64, viewport: Viewport) -> Result<WindowInfo> {
        self.call_for_window(BrowserCommand::ResizeWindow {
            window_id,
            width: viewport.width,
            height: viewport.height,
        })
        .await
    }

    async fn restore_window(&self, original: &WindowInfo) -> Result<WindowInfo> {
        self.call_for_window(BrowserCommand::RestoreWindow {
            window: original.clone(),
        })
        .await
    }

    async fn reload_active_tab(&self) -> Result<()> {
        self.call(BrowserCommand::ReloadTab).await.map(|_| ())
    }
}
