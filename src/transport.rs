//! `Content-Length` framed message transport.
//!
//! ```text
//! Content-Length: <byte-count>\r\n
//! \r\n
//! <UTF-8 JSON body>
//! ```
//!
//! Reading is done by one [`MessageReader`]; writing goes through a shared
//! [`MessageWriter`] whose mutex keeps each frame contiguous on the wire.

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use crate::jsonrpc::Message;

/// Largest body accepted. Longer frames are rejected without reading them.
pub const MAX_CONTENT_LENGTH: usize = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("message header has no Content-Length")]
    MissingContentLength,

    #[error("invalid Content-Length header value: `{0}`")]
    InvalidContentLength(String),

    #[error("message body is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("message body is not valid JSON: {0}")]
    Parse(serde_json::Error),

    #[error("message is not a JSON-RPC message: {0}")]
    InvalidMessage(serde_json::Error),

    #[error("failed to serialize message: {0}")]
    Serialize(serde_json::Error),
}

impl TransportError {
    /// Whether the stream itself is broken. Anything else only affects the
    /// message being read.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::Io(_))
    }
}

/// Encodes one message as a complete frame, header included.
pub fn encode(message: &Message) -> Result<Vec<u8>, TransportError> {
    let body = message.to_json().map_err(TransportError::Serialize)?;
    let mut frame = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    frame.extend_from_slice(&body);
    Ok(frame)
}

pub struct MessageReader<R> {
    inner: BufReader<R>,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(reader: R) -> Self {
        MessageReader {
            inner: BufReader::new(reader),
        }
    }

    /// Reads the next message.
    ///
    /// Returns `Ok(None)` once the stream ends. A non-fatal error means the
    /// current frame was consumed and reading can continue with the next one.
    pub async fn read_message(&mut self) -> Result<Option<Message>, TransportError> {
        let Some(content_length) = self.read_headers().await? else {
            return Ok(None);
        };

        let content_length = match content_length {
            Some(0) | None => return Err(TransportError::MissingContentLength),
            Some(length) if length > MAX_CONTENT_LENGTH => {
                return Err(TransportError::InvalidContentLength(length.to_string()))
            }
            Some(length) => length,
        };

        let mut body = vec![0u8; content_length];
        match self.inner.read_exact(&mut body).await {
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                tracing::warn!(
                    expected = content_length,
                    "stream ended in the middle of a message body"
                );
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        }

        let text = std::str::from_utf8(&body)?;
        let value: Value = serde_json::from_str(text).map_err(TransportError::Parse)?;
        let message = Message::from_value(value).map_err(TransportError::InvalidMessage)?;

        Ok(Some(message))
    }

    /// Reads header lines up to the blank separator line.
    ///
    /// The outer option is `None` at end of stream; the inner one carries the
    /// `Content-Length` value when present. An invalid length is reported only
    /// after the whole header block is consumed so the stream stays aligned.
    async fn read_headers(&mut self) -> Result<Option<Option<usize>>, TransportError> {
        let mut content_length = None;
        let mut invalid_length = None;
        let mut saw_header = false;

        loop {
            let mut raw = Vec::new();
            let read = self.inner.read_until(b'\n', &mut raw).await?;
            if read == 0 {
                if saw_header {
                    tracing::warn!("stream ended in the middle of a message header");
                }
                return Ok(None);
            }

            let Ok(line) = std::str::from_utf8(&raw) else {
                tracing::warn!(bytes = raw.len(), "ignoring header line that is not UTF-8");
                saw_header = true;
                continue;
            };
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                if !saw_header {
                    // stray blank line between frames
                    continue;
                }
                break;
            }
            saw_header = true;

            let Some((name, value)) = line.split_once(':') else {
                tracing::debug!(header = line, "ignoring malformed header line");
                continue;
            };

            if is_content_length(name) {
                match value.trim().parse::<usize>() {
                    Ok(length) => content_length = Some(length),
                    Err(_) => invalid_length = Some(value.trim().to_string()),
                }
            }
        }

        if let Some(value) = invalid_length {
            return Err(TransportError::InvalidContentLength(value));
        }

        Ok(Some(content_length))
    }
}

/// Matches the header name, also when leftovers of a rejected body precede it
/// on the same line.
fn is_content_length(name: &str) -> bool {
    const NAME: &str = "content-length";

    let name = name.trim();
    name.len()
        .checked_sub(NAME.len())
        .and_then(|start| name.get(start..))
        .is_some_and(|tail| tail.eq_ignore_ascii_case(NAME))
}

/// Shared, lock-protected output side of the transport.
pub struct MessageWriter {
    inner: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
}

impl MessageWriter {
    pub fn new(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        MessageWriter {
            inner: Mutex::new(Box::new(writer)),
        }
    }

    pub async fn send(&self, message: &Message) -> Result<(), TransportError> {
        let frame = encode(message)?;

        let mut out = self.inner.lock().await;
        out.write_all(&frame).await?;
        out.flush().await?;

        Ok(())
    }
}
