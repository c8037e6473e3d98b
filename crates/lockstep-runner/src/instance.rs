//! Per-instance adapter setup.
//!
//! The setup exchanges are written against a generic stream so they can be
//! exercised with in-memory fake adapters; the orchestrator instantiates
//! them over TCP connections.

use std::collections::HashMap;
use std::path::Path;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use lockstep_config::Instance;
use lockstep_dap::{
    BreakpointInfo, DapClient, LaunchArguments, SetBreakpointsResponseBody, ThreadsResponseBody,
};

use crate::adapter::AdapterProcess;
use crate::error::RunnerError;

/// A launched instance: its descriptor, adapter process, connection, and
/// the state accumulated during setup.
///
/// Generic over the process handle so orchestration paths can be tested
/// with scripted processes.
pub struct InstanceRuntime<P = AdapterProcess> {
    /// The scenario descriptor this instance was launched from.
    pub descriptor: Instance,
    /// Connection to the instance's adapter.
    pub client: DapClient<TcpStream>,
    /// The adapter process, reaped during teardown.
    pub process: P,
    /// The debuggee's single thread, resolved during setup.
    pub thread_id: i64,
    /// Installed breakpoints keyed by adapter-assigned id.
    pub breakpoints: HashMap<i64, BreakpointInfo>,
}

impl<P> InstanceRuntime<P> {
    /// Record the adapter's breakpoint bindings for later hit reporting.
    pub fn record_bindings(&mut self, bindings: Vec<BreakpointInfo>) {
        for info in bindings {
            if let Some(id) = info.id {
                self.breakpoints.insert(id, info);
            }
        }
    }
}

/// Run the initialize/launch handshake on a fresh connection.
///
/// The adapter emits its `initialized` event before the launch response, so
/// the reads are ordered event first.
pub async fn launch_handshake<S>(
    client: &mut DapClient<S>,
    args: &LaunchArguments,
) -> Result<(), RunnerError>
where
    S: AsyncRead + AsyncWrite,
{
    client.initialize().await?;
    client.read_response("initialize").await?;

    client.launch(args).await?;
    client.read_event("initialized").await?;
    client.read_response("launch").await?;
    Ok(())
}

/// Install breakpoints for one source file and verify every binding.
///
/// The adapter must report exactly as many breakpoints as were requested,
/// and each one must be verified.
pub async fn install_breakpoints<S>(
    client: &mut DapClient<S>,
    file: &Path,
    lines: &[i64],
) -> Result<Vec<BreakpointInfo>, RunnerError>
where
    S: AsyncRead + AsyncWrite,
{
    client.set_breakpoints(file, lines).await?;
    let response = client.read_response("setBreakpoints").await?;
    let body: SetBreakpointsResponseBody = response.parse_body()?;

    if body.breakpoints.len() != lines.len() {
        return Err(RunnerError::BreakpointVerification {
            file: file.to_path_buf(),
            detail: format!(
                "requested {} breakpoints, adapter reported {}",
                lines.len(),
                body.breakpoints.len()
            ),
        });
    }
    for (index, info) in body.breakpoints.iter().enumerate() {
        if !info.verified {
            let line = info.line.or_else(|| lines.get(index).copied()).unwrap_or(0);
            return Err(RunnerError::BreakpointVerification {
                file: file.to_path_buf(),
                detail: format!(
                    "line {line} not verified: {}",
                    info.message.as_deref().unwrap_or("no reason given")
                ),
            });
        }
        trace!(line = ?info.line, id = ?info.id, "breakpoint verified");
    }
    Ok(body.breakpoints)
}

/// Finish configuration and resolve the debuggee's single thread.
///
/// After `configurationDone` the adapter delivers, in order, the stop-on-entry
/// `stopped` event, one informational message that is read and discarded, and
/// the `configurationDone` response. A `threads` round trip then pins the
/// thread id; anything other than exactly one thread with a non-zero id is
/// an error, because the scripted sequence addresses instances, not threads,
/// and id 0 is reserved.
pub async fn complete_configuration<S>(
    client: &mut DapClient<S>,
    instance_id: &str,
) -> Result<i64, RunnerError>
where
    S: AsyncRead + AsyncWrite,
{
    client.configuration_done().await?;
    client.read_event("stopped").await?;
    let discarded = client.read_message().await?;
    debug!(instance = instance_id, message = %discarded.describe(), "discarded setup message");
    client.read_response("configurationDone").await?;

    client.threads().await?;
    let response = client.read_response("threads").await?;
    let body: ThreadsResponseBody = response.parse_body()?;
    if body.threads.len() != 1 {
        return Err(RunnerError::ThreadResolution {
            instance: instance_id.to_string(),
            detail: format!("reported {} threads, expected exactly one", body.threads.len()),
        });
    }
    let thread_id = body.threads[0].id;
    if thread_id == 0 {
        return Err(RunnerError::ThreadResolution {
            instance: instance_id.to_string(),
            detail: "reported reserved thread id 0".to_string(),
        });
    }
    debug!(instance = instance_id, thread_id, "instance configured");
    Ok(thread_id)
}
