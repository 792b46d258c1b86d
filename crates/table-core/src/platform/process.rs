//! Platform-specific process status checks and signalling.

#[cfg(not(unix))]
use tracing::warn;

/// Check if a process with the given PID is alive.
///
/// # Platform Behavior
/// - **Linux/macOS**: sends signal 0 with `kill(2)`; `EPERM` still means the
///   process exists.
/// - **Other**: not implemented, always reports alive.
pub fn is_process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let raw = match i32::try_from(pid) {
            Ok(raw) if raw > 0 => raw,
            _ => return false,
        };

        match kill(Pid::from_raw(raw), None) {
            Ok(()) => true,
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    #[cfg(not(unix))]
    {
        warn!("Process alive check not implemented for this platform");
        let _ = pid;
        true
    }
}

/// Kill every process in the group led by `pid`.
///
/// Processes started by the launcher lead their own group, so this also
/// takes down anything they forked. Returns false if nothing was signalled.
pub fn kill_process_group(pid: u32) -> bool {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let raw = match i32::try_from(pid) {
            Ok(raw) if raw > 0 => raw,
            _ => return false,
        };
        killpg(Pid::from_raw(raw), Signal::SIGKILL).is_ok()
    }

    #[cfg(not(unix))]
    {
        warn!("Process group kill not implemented for this platform");
        let _ = pid;
        false
    }
}
