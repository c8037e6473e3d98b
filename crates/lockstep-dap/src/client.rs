//! Per-connection DAP client.
//!
//! One `DapClient` per adapter connection. All operations are synchronous in
//! protocol terms: a send transmits without waiting, and the caller issues an
//! explicit typed read afterwards. This matters because some commands
//! interleave an event ahead of their own response (`launch` triggers an
//! `initialized` event before the launch response arrives). Reads block
//! without a timeout; a debuggee that never produces the awaited message
//! stalls the caller.

use std::path::Path;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tracing::trace;

use crate::error::DapError;
use crate::protocol::{
    ContinueArguments, Event, InitializeArguments, LaunchArguments, Message, Request, Response,
    SetBreakpointsArguments, Source, SourceBreakpoint,
};
use crate::transport;

/// A DAP client bound to one adapter connection.
///
/// Owns the connection's monotonically increasing request sequence counter,
/// initialized to 1 at connection time. Generic over the stream so protocol
/// exchanges can be tested against in-memory fake adapters.
pub struct DapClient<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    next_seq: i64,
}

impl DapClient<TcpStream> {
    /// Connect to an adapter listening on `addr`.
    pub async fn connect(addr: &str) -> Result<Self, DapError> {
        trace!(addr, "connecting to debug adapter");
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| DapError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self::from_stream(stream))
    }
}

impl<S> DapClient<S>
where
    S: AsyncRead + AsyncWrite,
{
    /// Wrap an established bidirectional stream.
    pub fn from_stream(stream: S) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            // Match VS Code numbering.
            next_seq: 1,
        }
    }

    fn next_seq(&mut self) -> i64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Assign the next sequence number and transmit one request.
    async fn send_request(
        &mut self,
        command: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<(), DapError> {
        let seq = self.next_seq();
        let message = Message::Request(Request {
            seq,
            message_type: "request".into(),
            command: command.into(),
            arguments,
        });
        trace!(command, seq, "sending request");
        let bytes = transport::encode_message(&message);
        self.writer
            .write_all(&bytes)
            .await
            .map_err(|e| DapError::Transport(format!("write failed: {e}")))?;
        self.writer
            .flush()
            .await
            .map_err(|e| DapError::Transport(format!("flush failed: {e}")))?;
        Ok(())
    }

    /// Send an `initialize` request.
    pub async fn initialize(&mut self) -> Result<(), DapError> {
        let args = serde_json::to_value(InitializeArguments::default()).unwrap_or_default();
        self.send_request("initialize", Some(args)).await
    }

    /// Send a `launch` request.
    ///
    /// The wire payload carries the closed argument set plus the adapter's
    /// fixed `request`/`mode` keys.
    pub async fn launch(&mut self, args: &LaunchArguments) -> Result<(), DapError> {
        let mut wire = serde_json::to_value(args).unwrap_or_default();
        if let serde_json::Value::Object(map) = &mut wire {
            map.insert("request".into(), "launch".into());
            map.insert("mode".into(), "debug".into());
        }
        self.send_request("launch", Some(wire)).await
    }

    /// Send a `setBreakpoints` request for one source file.
    ///
    /// Replaces all breakpoints previously set in that file.
    pub async fn set_breakpoints(&mut self, file: &Path, lines: &[i64]) -> Result<(), DapError> {
        let args = SetBreakpointsArguments {
            source: Source {
                name: file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned()),
                path: Some(file.to_string_lossy().into_owned()),
            },
            breakpoints: lines
                .iter()
                .map(|&line| SourceBreakpoint { line })
                .collect(),
        };
        let args = serde_json::to_value(args).unwrap_or_default();
        self.send_request("setBreakpoints", Some(args)).await
    }

    /// Send a `configurationDone` request.
    pub async fn configuration_done(&mut self) -> Result<(), DapError> {
        self.send_request("configurationDone", None).await
    }

    /// Send a `continue` request for the given thread.
    pub async fn continue_thread(&mut self, thread_id: i64) -> Result<(), DapError> {
        let args = serde_json::to_value(ContinueArguments { thread_id }).unwrap_or_default();
        self.send_request("continue", Some(args)).await
    }

    /// Send a `threads` request.
    pub async fn threads(&mut self) -> Result<(), DapError> {
        self.send_request("threads", None).await
    }

    /// Read the next message of any kind, blocking until one arrives.
    pub async fn read_message(&mut self) -> Result<Message, DapError> {
        let message = transport::read_message(&mut self.reader).await?;
        trace!(message = %message.describe(), "received message");
        Ok(message)
    }

    /// Read the next message and require it to be a successful response to
    /// `command`.
    ///
    /// Fails with [`DapError::UnexpectedMessage`] (carrying the actual
    /// message) on a type or command mismatch, and [`DapError::Rejected`]
    /// when the adapter reports `success = false`.
    pub async fn read_response(&mut self, command: &str) -> Result<Response, DapError> {
        match self.read_message().await? {
            Message::Response(resp) if resp.command == command => {
                if !resp.success {
                    return Err(DapError::Rejected {
                        command: command.to_string(),
                        message: resp
                            .message
                            .unwrap_or_else(|| "no reason given".to_string()),
                    });
                }
                Ok(resp)
            }
            other => Err(DapError::UnexpectedMessage {
                expected: format!("'{command}' response"),
                actual: Box::new(other),
            }),
        }
    }

    /// Read the next message and require it to be the named event.
    pub async fn read_event(&mut self, name: &str) -> Result<Event, DapError> {
        match self.read_message().await? {
            Message::Event(event) if event.event == name => Ok(event),
            other => Err(DapError::UnexpectedMessage {
                expected: format!("'{name}' event"),
                actual: Box::new(other),
            }),
        }
    }
}
