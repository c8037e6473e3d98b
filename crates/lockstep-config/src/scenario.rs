use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which debug adapter drives an instance.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    /// The Delve DAP server (`dlv dap`).
    #[default]
    Delve,
}

impl AdapterKind {
    /// The executable name for this adapter kind.
    pub fn executable(&self) -> &'static str {
        match self {
            AdapterKind::Delve => "dlv",
        }
    }
}

/// One configured program/adapter pair under orchestrator control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// Identifier the action sequence refers to.
    pub id: String,
    /// Human-readable label.
    #[serde(default)]
    pub name: String,
    /// Which adapter drives this instance.
    #[serde(default)]
    pub adapter: AdapterKind,
    /// Program path passed to the adapter's launch request.
    pub program: String,
    /// Debuggee environment as a `KEY=VALUE;KEY=VALUE` string.
    #[serde(default)]
    pub env: String,
    /// Working directory for the adapter and debuggee.
    pub cwd: PathBuf,
}

impl Instance {
    /// Parse the instance's env string into a map.
    pub fn env_map(&self) -> Result<HashMap<String, String>, ConfigError> {
        parse_env(&self.env).map_err(|message| ConfigError::Validation {
            field: format!("instances.{}.env", self.id),
            message,
        })
    }
}

/// One scripted orchestrator step.
///
/// The sequence is one global total order of orchestrator-issued operations,
/// not a per-instance interleave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Resume an instance and wait for the continue acknowledgment.
    Run {
        /// Target instance id.
        instance: String,
    },
    /// Block until the instance reports a stopped event.
    Pause {
        /// Target instance id.
        instance: String,
        /// Source file containing the pause marker.
        file: PathBuf,
        /// Text fragment identifying the line to break on.
        marker: String,
    },
    /// Resume an instance without waiting for any reply.
    Continue {
        /// Target instance id.
        instance: String,
    },
    /// Suspend the orchestrator, letting all instances run unattended.
    Sleep {
        /// Wall-clock duration in seconds.
        seconds: u64,
    },
}

impl Action {
    /// The instance this action targets, if any.
    pub fn instance(&self) -> Option<&str> {
        match self {
            Action::Run { instance }
            | Action::Pause { instance, .. }
            | Action::Continue { instance } => Some(instance),
            Action::Sleep { .. } => None,
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Run { .. } => "run",
            Action::Pause { .. } => "pause",
            Action::Continue { .. } => "continue",
            Action::Sleep { .. } => "sleep",
        }
    }
}

/// A complete reproduction scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Instances, in launch order.
    #[serde(default)]
    pub instances: Vec<Instance>,
    /// The scripted action sequence.
    #[serde(default)]
    pub sequence: Vec<Action>,
}

impl Scenario {
    /// Look up an instance descriptor by id.
    pub fn instance(&self, id: &str) -> Option<&Instance> {
        self.instances.iter().find(|i| i.id == id)
    }
}

/// Parse a `KEY=VALUE;KEY=VALUE` environment string.
///
/// Empty segments are skipped; a segment without `=`, or with an empty key
/// or value, is an error described by the returned message.
pub fn parse_env(env: &str) -> Result<HashMap<String, String>, String> {
    let mut vars = HashMap::new();
    for segment in env.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (key, value) = segment
            .split_once('=')
            .ok_or_else(|| format!("malformed pair '{segment}', expected KEY=VALUE"))?;
        if key.is_empty() || value.is_empty() {
            return Err(format!("malformed pair '{segment}', expected KEY=VALUE"));
        }
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}
