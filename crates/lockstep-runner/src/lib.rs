//! lockstep-runner — scenario orchestration for LOCKSTEP.
//!
//! Spawns one debug adapter per instance, wires a DAP client to each, and
//! plays a scripted action sequence to pin down a reproducible interleaving
//! across the instances.

pub mod adapter;
pub mod error;
pub mod instance;
pub mod orchestrator;
pub mod resolver;

pub use adapter::{AdapterLauncher, AdapterProcess, AdapterSpawner, ProcessHandle};
pub use error::RunnerError;
pub use instance::InstanceRuntime;
pub use orchestrator::{check_references, run};
pub use resolver::find_marker_line;
