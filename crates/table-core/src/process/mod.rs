//! Process management for dealers and opponent bots.
//!
//! Launching goes through [`ProcessLauncher`], liveness checks through
//! [`ProcessProbe`]. Both are traits so the orchestration logic can be driven
//! by fakes in tests.

mod launcher;
mod probe;

pub use launcher::{OsProcessLauncher, ProcessLauncher};
pub use probe::{OsProcessProbe, ProcessProbe};

pub(crate) use launcher::{detached_command, open_log, reap_in_background};
