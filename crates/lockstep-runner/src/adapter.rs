//! Debug adapter process management.
//!
//! Each instance gets its own adapter process listening on its own port.
//! Ports are handed out sequentially from a fixed base so runs are
//! reproducible and logs are easy to correlate with instances.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, info};

use lockstep_config::AdapterKind;

use crate::error::RunnerError;

/// Host adapters are asked to listen on.
pub const DEFAULT_HOST: &str = "localhost";

/// First port handed out to an adapter.
pub const DEFAULT_BASE_PORT: u16 = 59000;

/// Grace period between spawning an adapter and connecting to it. The
/// adapter gives no readiness signal before it starts listening.
const STARTUP_DELAY: Duration = Duration::from_millis(100);

/// Starts adapter processes. The orchestrator is generic over this seam so
/// launch failures can be scripted in tests without an adapter binary.
pub trait AdapterSpawner {
    /// Handle for processes this spawner starts.
    type Process: ProcessHandle;

    /// Start one adapter process and wait for it to begin listening.
    fn spawn(
        &mut self,
        kind: AdapterKind,
        cwd: &Path,
    ) -> impl std::future::Future<Output = Result<Self::Process, RunnerError>>;
}

/// A started adapter process: addressable, terminable.
pub trait ProcessHandle {
    /// Address clients should connect to.
    fn addr(&self) -> &str;

    /// Ask the OS to kill the process. Does not wait for it to exit.
    fn terminate(&mut self) -> std::io::Result<()>;
}

/// Spawns adapter processes on sequentially allocated ports.
pub struct AdapterLauncher {
    host: String,
    next_port: u16,
}

impl AdapterLauncher {
    pub fn new() -> Self {
        Self::with_base(DEFAULT_HOST, DEFAULT_BASE_PORT)
    }

    pub fn with_base(host: &str, base_port: u16) -> Self {
        Self {
            host: host.to_string(),
            next_port: base_port,
        }
    }

    fn allocate_addr(&mut self) -> String {
        let addr = format!("{}:{}", self.host, self.next_port);
        self.next_port += 1;
        addr
    }
}

impl AdapterSpawner for AdapterLauncher {
    type Process = AdapterProcess;

    async fn spawn(&mut self, kind: AdapterKind, cwd: &Path) -> Result<AdapterProcess, RunnerError> {
        let addr = self.allocate_addr();
        let mut command = adapter_command(kind, cwd, &addr);
        debug!(executable = kind.executable(), addr, "starting adapter");
        let child = command.spawn().map_err(|source| RunnerError::Spawn {
            command: kind.executable().to_string(),
            source,
        })?;
        info!(addr, cwd = %cwd.display(), "adapter started");
        tokio::time::sleep(STARTUP_DELAY).await;
        Ok(AdapterProcess { child, addr })
    }
}

impl Default for AdapterLauncher {
    fn default() -> Self {
        Self::new()
    }
}

fn adapter_command(kind: AdapterKind, cwd: &Path, addr: &str) -> Command {
    let mut command = Command::new(kind.executable());
    match kind {
        AdapterKind::Delve => {
            command
                .arg("dap")
                .arg("--wd")
                .arg(cwd)
                .arg("--listen")
                .arg(addr);
        }
    }
    command.stdout(Stdio::null()).stderr(Stdio::null());
    command
}

/// A running adapter process and the address it listens on.
pub struct AdapterProcess {
    child: Child,
    addr: String,
}

impl ProcessHandle for AdapterProcess {
    fn addr(&self) -> &str {
        &self.addr
    }

    fn terminate(&mut self) -> std::io::Result<()> {
        self.child.start_kill()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use std::path::PathBuf;

    #[test]
    fn launcher_allocates_sequential_addresses() {
        let mut launcher = AdapterLauncher::new();
        assert_eq!(launcher.allocate_addr(), "localhost:59000");
        assert_eq!(launcher.allocate_addr(), "localhost:59001");
        assert_eq!(launcher.allocate_addr(), "localhost:59002");
    }

    #[test]
    fn launcher_honors_custom_base() {
        let mut launcher = AdapterLauncher::with_base("127.0.0.1", 7000);
        assert_eq!(launcher.allocate_addr(), "127.0.0.1:7000");
        assert_eq!(launcher.allocate_addr(), "127.0.0.1:7001");
    }

    #[test]
    fn delve_command_shape() {
        let command = adapter_command(
            AdapterKind::Delve,
            &PathBuf::from("/work/examples"),
            "localhost:59000",
        );
        let std = command.as_std();
        assert_eq!(std.get_program(), OsStr::new("dlv"));
        let args: Vec<_> = std.get_args().collect();
        assert_eq!(
            args,
            vec![
                OsStr::new("dap"),
                OsStr::new("--wd"),
                OsStr::new("/work/examples"),
                OsStr::new("--listen"),
                OsStr::new("localhost:59000"),
            ]
        );
    }
}
