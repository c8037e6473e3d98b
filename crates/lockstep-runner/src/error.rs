use std::path::PathBuf;
use thiserror::Error;

use lockstep_config::ConfigError;
use lockstep_dap::DapError;

/// Errors raised while orchestrating a scenario.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// A protocol exchange with an adapter failed.
    #[error(transparent)]
    Dap(#[from] DapError),

    /// An instance descriptor could not be turned into launch arguments.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The adapter process could not be started.
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        /// Executable that failed to start.
        command: String,
        source: std::io::Error,
    },

    /// The adapter could not bind the requested breakpoints.
    #[error("breakpoint setup failed in {}: {detail}", file.display())]
    BreakpointVerification {
        /// Source file the breakpoints were requested in.
        file: PathBuf,
        /// What the adapter reported.
        detail: String,
    },

    /// A pause marker does not occur in its source file.
    #[error("marker '{marker}' not found in {}", file.display())]
    MarkerNotFound {
        /// The marker text searched for.
        marker: String,
        /// File that was scanned.
        file: PathBuf,
    },

    /// An action names an instance the scenario never declared.
    #[error("action refers to unknown instance '{id}'")]
    UnknownInstance {
        /// The undeclared id.
        id: String,
    },

    /// The debuggee did not report exactly one usable thread after setup.
    #[error("instance '{instance}' thread resolution failed: {detail}")]
    ThreadResolution {
        /// Instance whose thread list was unusable.
        instance: String,
        /// What the adapter reported.
        detail: String,
    },

    /// Local file I/O failed (marker resolution, path normalization).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
