//! Native-messaging framing: a 4-byte length in native byte order, then
//! that many bytes of UTF-8 JSON.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const MAX_INBOUND_BYTES: usize = 64 * 1024 * 1024;
/// Browsers refuse host messages above 1 MiB.
pub const MAX_OUTBOUND_BYTES: usize = 1024 * 1024;

/// Reads one frame. `Ok(None)` means the browser closed the pipe cleanly.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Value>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err).context("failed to read frame length"),
    }

    let len = u32::from_ne_bytes(header) as usize;
    if len > MAX_INBOUND_BYTES {
        bail!("inbound frame of {len} bytes exceeds {MAX_INBOUND_BYTES}");
    }

    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .with_context(|| format!("failed to read {len}-byte frame body"))?;
    let value = serde_json::from_slice(&body).context("frame body is not valid JSON")?;
    Ok(Some(value))
}

pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let body = serde_json::to_vec(message).context("failed to encode frame")?;
    if body.len() > MAX_OUTBOUND_BYTES {
        bail!(
            "outbound frame of {} bytes exceeds {MAX_OUTBOUND_BYTES}",
            body.len()
        );
    }

    let len = u32::try_from(body.len()).context("frame length overflows u32")?;
    writer.write_all(&len.to_ne_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await.context("failed to flush frame")?;
    Ok(())
}
