//! lockstep-dap — Debug Adapter Protocol client for LOCKSTEP.
//!
//! This crate implements the DAP client side used to drive debuggees under
//! adapter control. It handles protocol types, message framing, and the
//! per-connection command/read API.

pub mod client;
pub mod error;
pub mod protocol;
pub mod transport;

// Re-export key types for convenience.
pub use client::DapClient;
pub use error::DapError;
pub use protocol::*;
