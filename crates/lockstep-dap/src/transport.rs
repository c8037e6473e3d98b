//! DAP transport layer — Content-Length based message framing.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::DapError;
use crate::protocol::Message;

/// Encode a message into the DAP wire format with a Content-Length header.
pub fn encode_message(message: &Message) -> Vec<u8> {
    let body = message.to_value().to_string();
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    let mut buf = Vec::with_capacity(header.len() + body.len());
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(body.as_bytes());
    buf
}

/// Decode exactly one message from a byte buffer.
///
/// Returns the parsed message and the number of bytes consumed. Fails with
/// [`DapError::Framing`] if the buffer does not contain one complete,
/// well-formed frame, and with [`DapError::Decode`] if the payload's type
/// discriminant is unrecognized.
pub fn decode_message(data: &[u8]) -> Result<(Message, usize), DapError> {
    let data_str = std::str::from_utf8(data)
        .map_err(|e| DapError::Framing(format!("invalid UTF-8: {e}")))?;

    let separator = "\r\n\r\n";
    let sep_pos = data_str
        .find(separator)
        .ok_or_else(|| DapError::Framing("incomplete header: missing \\r\\n\\r\\n".into()))?;

    let header_part = &data_str[..sep_pos];
    let body_start = sep_pos + separator.len();

    let content_length = parse_content_length(header_part)?;

    let total_consumed = body_start + content_length;
    if data.len() < total_consumed {
        return Err(DapError::Framing(format!(
            "incomplete body: expected {content_length} bytes, have {}",
            data.len() - body_start
        )));
    }

    let body_bytes = &data[body_start..total_consumed];
    let value: serde_json::Value = serde_json::from_slice(body_bytes)
        .map_err(|e| DapError::Framing(format!("JSON parse error: {e}")))?;

    let message = Message::from_value(value)?;
    Ok((message, total_consumed))
}

/// Read one complete message from an async stream.
///
/// Blocks until a full frame is available; no buffering beyond the one
/// message being assembled.
pub async fn read_message<R>(reader: &mut R) -> Result<Message, DapError>
where
    R: AsyncBufRead + Unpin,
{
    // Header lines up to the blank separator line.
    let mut content_length: Option<usize> = None;
    loop {
        let mut line = String::new();
        let n = reader
            .read_line(&mut line)
            .await
            .map_err(|e| DapError::Transport(format!("header read failed: {e}")))?;
        if n == 0 {
            return Err(DapError::Transport("connection closed by adapter".into()));
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }
        if let Some(value) = trimmed.strip_prefix("Content-Length:") {
            let value = value.trim();
            content_length = Some(value.parse::<usize>().map_err(|e| {
                DapError::Framing(format!("invalid Content-Length value '{value}': {e}"))
            })?);
        }
    }
    let content_length =
        content_length.ok_or_else(|| DapError::Framing("missing Content-Length header".into()))?;

    let mut body = vec![0u8; content_length];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| DapError::Transport(format!("body read failed: {e}")))?;

    let value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| DapError::Framing(format!("JSON parse error: {e}")))?;
    Message::from_value(value)
}

/// Parse the Content-Length value from the header section.
fn parse_content_length(header: &str) -> Result<usize, DapError> {
    for line in header.split("\r\n") {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("Content-Length:") {
            let value = value.trim();
            return value.parse::<usize>().map_err(|e| {
                DapError::Framing(format!("invalid Content-Length value '{value}': {e}"))
            });
        }
    }
    Err(DapError::Framing("missing Content-Length header".into()))
}
