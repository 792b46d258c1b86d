//! Spawning external processes (dealers and opponent bots).

use crate::error::{Result, TableError};
use async_trait::async_trait;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Starts an external process from a command line and returns its PID.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Spawn `command[0]` with the remaining elements as arguments.
    ///
    /// The command is not validated beyond being non-empty. Failure to exec is
    /// a launch error; nothing is retried.
    async fn spawn(&self, command: &[String]) -> Result<u32>;
}

/// Launches real OS processes.
///
/// Each process gets its own process group so a Ctrl-C aimed at the worker
/// does not take the table down with it, and a background task waits on the
/// child so an exited process is reaped instead of lingering as a zombie that
/// `kill(pid, 0)` would still report as alive.
#[derive(Debug, Clone, Default)]
pub struct OsProcessLauncher {
    /// Where stdout/stderr of spawned processes go. `None` discards output.
    log_dir: Option<PathBuf>,
}

impl OsProcessLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture each process's output in a timestamped file under `dir`.
    pub fn with_log_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.log_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    fn log_file_for(&self, program: &str) -> Option<PathBuf> {
        let dir = self.log_dir.as_ref()?;
        let stem = Path::new(program)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "process".to_string());
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S%3f");
        Some(dir.join(format!("{}_{}.log", stem, timestamp)))
    }
}

#[async_trait]
impl ProcessLauncher for OsProcessLauncher {
    async fn spawn(&self, command: &[String]) -> Result<u32> {
        let (program, args) = split_command(command)?;
        let mut cmd = detached_command(program, args);
        cmd.stdin(Stdio::null());

        match self.log_file_for(program) {
            Some(log_path) => {
                let (stdout, stderr) = open_log(program, &log_path)?;
                cmd.stdout(stdout).stderr(stderr);
            }
            None => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        let child = cmd.spawn().map_err(|e| TableError::Launch {
            program: program.to_string(),
            message: e.to_string(),
            source: Some(e),
        })?;
        let pid = reap_in_background(child, program)?;

        info!(pid, program, "Launched process");
        Ok(pid)
    }
}

/// Split a command line into program and arguments, rejecting empty ones.
pub(crate) fn split_command(command: &[String]) -> Result<(&str, &[String])> {
    match command.split_first() {
        Some((program, args)) if !program.is_empty() => Ok((program.as_str(), args)),
        _ => Err(TableError::Launch {
            program: String::new(),
            message: "empty command".to_string(),
            source: None,
        }),
    }
}

/// Build a command that runs in its own process group.
pub(crate) fn detached_command(program: impl AsRef<std::ffi::OsStr>, args: &[String]) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.kill_on_drop(false);
    #[cfg(unix)]
    cmd.process_group(0);
    cmd
}

/// Open a log file for a child's stdout and stderr.
pub(crate) fn open_log(program: &str, log_path: &Path) -> Result<(Stdio, Stdio)> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).map_err(|e| TableError::io_with_path(e, parent))?;
    }
    let file = fs::File::create(log_path).map_err(|e| TableError::Launch {
        program: program.to_string(),
        message: format!("cannot create log file {}", log_path.display()),
        source: Some(e),
    })?;
    let stderr = file
        .try_clone()
        .map_err(|e| TableError::io_with_path(e, log_path))?;
    Ok((Stdio::from(file), Stdio::from(stderr)))
}

/// Hand the child to a task that waits for it, returning its PID.
pub(crate) fn reap_in_background(mut child: Child, program: &str) -> Result<u32> {
    let pid = child.id().ok_or_else(|| TableError::Launch {
        program: program.to_string(),
        message: "process exited before its pid could be read".to_string(),
        source: None,
    })?;

    let program = program.to_string();
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => debug!(pid, program = %program, %status, "Process exited"),
            Err(e) => warn!(pid, program = %program, "Failed waiting on process: {}", e),
        }
    });

    Ok(pid)
}
