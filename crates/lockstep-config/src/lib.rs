//! lockstep-config — scenario files for LOCKSTEP.
//!
//! A scenario declares the instances to run under adapter control and the
//! scripted action sequence that pins down their interleaving.

pub mod error;
pub mod load;
pub mod scenario;
pub mod validate;

pub use error::ConfigError;
pub use load::{load_from_str, load_scenario};
pub use scenario::{parse_env, Action, AdapterKind, Instance, Scenario};
pub use validate::validate;
