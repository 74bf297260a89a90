//! Native-messaging host: reads action frames from the extension, routes
//! them to the pipeline, and writes replies and browser requests back on a
//! single ordered writer.

pub mod bridge;
pub mod commands;
pub mod framing;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
};

use crate::{
    db::Database,
    messages::{Envelope, Reply},
    settings::PipelineSettings,
    AppState,
};

pub use bridge::{BrowserReply, ExtensionBridge};
pub use commands::handle_message;
pub use framing::{read_frame, write_frame, MAX_INBOUND_BYTES, MAX_OUTBOUND_BYTES};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Serves one extension connection until the browser closes the pipe.
pub async fn serve<R, W>(mut reader: R, mut writer: W, db: Database, pipeline: PipelineSettings) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Value>();
    let state = AppState::new(db, pipeline, outbound_tx.clone());

    let writer_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if let Err(err) = write_frame(&mut writer, &frame).await {
                log_warn!("dropping outbound frame: {err:?}");
            }
        }
    });

    let result = read_loop(&mut reader, &state, &outbound_tx).await;

    // Closing the pipe ends any run in flight; nothing is left to observe it
    // or to answer its browser requests.
    state.bridge.close().await;
    state.analysis.stop().await;
    state.observer.teardown();
    drop(state);
    drop(outbound_tx);
    writer_task.await.context("outbound writer task failed")?;
    result
}

async fn read_loop<R>(reader: &mut R, state: &AppState, outbound: &mpsc::UnboundedSender<Value>) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    while let Some(frame) = read_frame(reader).await? {
        let (id, reply) = match serde_json::from_value::<Envelope>(frame) {
            Ok(Envelope { id, message }) => {
                log_debug!("handling {}", message.action());
                (id, handle_message(state, message).await)
            }
            Err(err) => {
                log_warn!("unrecognised message: {err}");
                (None, Reply::error(format!("unrecognised message: {err}")))
            }
        };

        let frame = reply.into_frame(id).context("failed to encode reply")?;
        if outbound.send(frame).is_err() {
            break;
        }
    }
    log_info!("extension closed the connection");
    Ok(())
}
