//! Process liveness checks.

use crate::platform;

/// Answers "does this PID still refer to a live process?".
///
/// The answer is a snapshot; the process may die right after the check.
pub trait ProcessProbe: Send + Sync {
    fn is_alive(&self, pid: u32) -> bool;
}

/// Probe backed by the operating system's process table.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsProcessProbe;

impl ProcessProbe for OsProcessProbe {
    fn is_alive(&self, pid: u32) -> bool {
        platform::is_process_alive(pid)
    }
}
