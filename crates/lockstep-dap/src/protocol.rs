//! DAP protocol message types.
//!
//! Implements the subset of the Debug Adapter Protocol needed to launch,
//! break, continue, and identify threads, with serde support.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::DapError;

// ---------------------------------------------------------------------------
// Base protocol messages
// ---------------------------------------------------------------------------

/// A protocol message, discriminated on the wire `type` field.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A client-issued request.
    Request(Request),
    /// An adapter response to a request.
    Response(Response),
    /// An adapter-initiated event.
    Event(Event),
}

impl Message {
    /// Parse one message from a decoded JSON value.
    ///
    /// Fails with [`DapError::Decode`] when the `type` discriminant is
    /// missing or not one of `request` / `response` / `event`.
    pub fn from_value(value: serde_json::Value) -> Result<Self, DapError> {
        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| DapError::Decode("message has no 'type' field".into()))?
            .to_string();
        match kind.as_str() {
            "request" => serde_json::from_value(value)
                .map(Message::Request)
                .map_err(|e| DapError::Decode(format!("invalid request: {e}"))),
            "response" => serde_json::from_value(value)
                .map(Message::Response)
                .map_err(|e| DapError::Decode(format!("invalid response: {e}"))),
            "event" => serde_json::from_value(value)
                .map(Message::Event)
                .map_err(|e| DapError::Decode(format!("invalid event: {e}"))),
            other => Err(DapError::Decode(format!("unknown message type '{other}'"))),
        }
    }

    /// Serialize this message to a JSON value.
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Message::Request(r) => serde_json::to_value(r).unwrap_or_default(),
            Message::Response(r) => serde_json::to_value(r).unwrap_or_default(),
            Message::Event(e) => serde_json::to_value(e).unwrap_or_default(),
        }
    }

    /// Short human-readable description, used in error reporting.
    pub fn describe(&self) -> String {
        match self {
            Message::Request(r) => format!("'{}' request", r.command),
            Message::Response(r) => format!("'{}' response", r.command),
            Message::Event(e) => format!("'{}' event", e.event),
        }
    }
}

/// A DAP request message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Sequence number.
    pub seq: i64,
    /// Always "request".
    #[serde(rename = "type")]
    pub message_type: String,
    /// The command to execute.
    pub command: String,
    /// Command arguments (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<serde_json::Value>,
}

/// A DAP response message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Sequence number.
    pub seq: i64,
    /// Always "response".
    #[serde(rename = "type")]
    pub message_type: String,
    /// Sequence number of the corresponding request.
    pub request_seq: i64,
    /// Whether the request was successful.
    pub success: bool,
    /// The command this response is for.
    pub command: String,
    /// Error message if `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Response body (command-specific).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl Response {
    /// Deserialize the response body into a typed structure.
    pub fn parse_body<T: DeserializeOwned>(&self) -> Result<T, DapError> {
        let body = self.body.clone().unwrap_or(serde_json::Value::Null);
        serde_json::from_value(body).map_err(|e| {
            DapError::Decode(format!("invalid '{}' response body: {e}", self.command))
        })
    }
}

/// A DAP event message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Sequence number.
    pub seq: i64,
    /// Always "event".
    #[serde(rename = "type")]
    pub message_type: String,
    /// The event name.
    pub event: String,
    /// Event body (event-specific).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl Event {
    /// Deserialize the event body into a typed structure.
    pub fn parse_body<T: DeserializeOwned>(&self) -> Result<T, DapError> {
        let body = self.body.clone().unwrap_or(serde_json::Value::Null);
        serde_json::from_value(body)
            .map_err(|e| DapError::Decode(format!("invalid '{}' event body: {e}", self.event)))
    }
}

// ---------------------------------------------------------------------------
// Request arguments
// ---------------------------------------------------------------------------

/// Arguments for the `initialize` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeArguments {
    /// ID of the debug adapter.
    pub adapter_id: String,
    /// Client locale (e.g. "en-us").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Path format: "path" or "uri".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_format: Option<String>,
    /// Whether lines are 1-based.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines_start_at1: Option<bool>,
    /// Whether columns are 1-based.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns_start_at1: Option<bool>,
    /// Whether the client supports variable type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_variable_type: Option<bool>,
    /// Whether the client supports the `runInTerminal` request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_run_in_terminal_request: Option<bool>,
}

impl Default for InitializeArguments {
    fn default() -> Self {
        Self {
            adapter_id: "lockstep".into(),
            locale: Some("en-us".into()),
            path_format: Some("path".into()),
            lines_start_at1: Some(true),
            columns_start_at1: Some(true),
            supports_variable_type: Some(true),
            supports_run_in_terminal_request: Some(true),
        }
    }
}

/// Arguments for the `launch` request.
///
/// A closed structure enumerating the recognized launch keys. The debuggee's
/// working directory is delivered through the adapter's `dlvCwd` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchArguments {
    /// Path of the program to debug.
    pub program: String,
    /// Working directory for the debuggee.
    #[serde(rename = "dlvCwd")]
    pub cwd: String,
    /// Environment variables for the debuggee.
    pub env: HashMap<String, String>,
    /// Halt the debuggee before its first instruction.
    #[serde(rename = "stopOnEntry")]
    pub stop_on_entry: bool,
}

/// Arguments for the `setBreakpoints` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointsArguments {
    /// The source to set breakpoints in.
    pub source: Source,
    /// Breakpoints to set (replaces all previous ones for this source).
    pub breakpoints: Vec<SourceBreakpoint>,
}

/// A source location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Short name of the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// File system path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// A breakpoint requested by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBreakpoint {
    /// The source line of the breakpoint (1-based).
    pub line: i64,
}

/// Arguments for the `continue` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueArguments {
    /// The thread to continue.
    pub thread_id: i64,
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

/// Response body for `setBreakpoints`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointsResponseBody {
    /// Information about the installed breakpoints, in request order.
    pub breakpoints: Vec<BreakpointInfo>,
}

/// A breakpoint as reported back by the adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointInfo {
    /// Adapter-assigned identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Whether the adapter could bind the breakpoint.
    pub verified: bool,
    /// Failure detail when unverified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Actual source of the breakpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    /// Actual line of the breakpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<i64>,
}

/// Response body for `threads`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadsResponseBody {
    /// All threads of the debuggee.
    pub threads: Vec<Thread>,
}

/// A thread in the debuggee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    /// Unique identifier of the thread.
    pub id: i64,
    /// Human-readable name of the thread.
    pub name: String,
}

// ---------------------------------------------------------------------------
// Event bodies
// ---------------------------------------------------------------------------

/// Body of the `stopped` event.
///
/// The reason is kept as a free-form string: adapters report reasons beyond
/// the ones this harness acts on, and an unrecognized reason must not fail
/// the decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoppedEventBody {
    /// The reason for the stop ("entry", "breakpoint", "pause", ...).
    pub reason: String,
    /// Thread that stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<i64>,
    /// Whether all threads are stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_threads_stopped: Option<bool>,
    /// Adapter ids of the breakpoints that were hit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_breakpoint_ids: Option<Vec<i64>>,
}

/// Body of the `output` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputEventBody {
    /// Output category: "console", "stdout", "stderr".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// The output text.
    pub output: String,
}

/// Body of the `terminated` event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminatedEventBody {
    /// Restart data; if present, a restart is requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
