//! `Content-Length` framing: `Content-Length: N\r\n\r\n` followed by exactly N bytes.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest body accepted from a peer.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame has no Content-Length header")]
    MissingLength,
    #[error("invalid Content-Length: {0:?}")]
    InvalidLength(String),
    #[error("Content-Length {length} exceeds the {max} byte frame limit")]
    TooLarge { length: usize, max: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Read one frame body. Returns `Ok(None)` at end of stream.
///
/// Header errors consume the header block, so the caller can log and read the next frame.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    let mut length: Option<Result<usize, String>> = None;
    let mut saw_header = false;
    let mut raw = Vec::new();

    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw).await? == 0 {
            return Ok(None);
        }
        // header bytes that are not UTF-8 cannot name Content-Length; keep going
        let line = String::from_utf8_lossy(&raw);
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            if saw_header {
                break;
            }
            // blank separator with no headers
            return Err(FrameError::MissingLength);
        }
        saw_header = true;

        if let Some((key, value)) = trimmed.split_once(':') {
            if key.trim().eq_ignore_ascii_case("content-length") {
                let value = value.trim();
                length = Some(value.parse::<usize>().map_err(|_| value.to_string()));
            }
        }
    }

    let length = match length {
        None => return Err(FrameError::MissingLength),
        Some(Err(bad)) => return Err(FrameError::InvalidLength(bad)),
        Some(Ok(n)) if n > MAX_FRAME_BYTES => {
            return Err(FrameError::TooLarge {
                length: n,
                max: MAX_FRAME_BYTES,
            })
        }
        Some(Ok(n)) => n,
    };

    let mut body = Vec::new();
    reader.take(length as u64).read_to_end(&mut body).await?;
    if body.len() < length {
        // truncated body
        return Ok(None);
    }
    Ok(Some(body))
}

/// Write one framed message and flush.
pub async fn write_frame<W>(writer: &mut W, body: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await
}
