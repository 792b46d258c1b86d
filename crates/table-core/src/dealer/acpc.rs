use super::{DealerArguments, DealerInfo, DealerLauncher};
use crate::error::{Result, TableError};
use crate::platform::kill_process_group;
use crate::process::{detached_command, open_log, reap_in_background};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout};
use tracing::{debug, info, warn};

/// Launches the ACPC dealer binary.
#[derive(Debug, Clone)]
pub struct AcpcDealerLauncher {
    program: PathBuf,
}

impl AcpcDealerLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// The dealer runs inside the log directory, so relative paths are made
    /// absolute first.
    fn absolute(path: &Path) -> Result<PathBuf> {
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        let cwd = std::env::current_dir()?;
        Ok(cwd.join(path))
    }

    async fn read_ports(
        lines: &mut Lines<BufReader<ChildStdout>>,
        args: &DealerArguments,
    ) -> Result<Vec<u16>> {
        let first = lines.next_line().await?.ok_or_else(|| TableError::DealerOutput {
            match_name: args.match_name.clone(),
            message: "dealer exited before reporting its ports".to_string(),
        })?;
        parse_port_line(&args.match_name, &first, args.player_names.len())
    }

    /// Kill a dealer whose startup failed and wait for it, so nothing is left
    /// running that the registry does not know about.
    async fn discard(mut child: Child, match_name: &str) {
        if let Some(pid) = child.id() {
            if !kill_process_group(pid) {
                if let Err(e) = child.start_kill() {
                    debug!(pid, match_name, "Dealer already gone: {}", e);
                }
            }
        }
        match child.wait().await {
            Ok(status) => info!(match_name, %status, "Stopped dealer that failed to start"),
            Err(e) => warn!(match_name, "Failed waiting on dealer: {}", e),
        }
    }
}

/// Parse the dealer's port line, expecting one port per player.
pub(crate) fn parse_port_line(match_name: &str, line: &str, players: usize) -> Result<Vec<u16>> {
    let ports = line
        .split_whitespace()
        .map(|p| p.parse::<u16>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| TableError::DealerOutput {
            match_name: match_name.to_string(),
            message: format!("{:?} is not a port list: {}", line.trim(), e),
        })?;

    if ports.len() != players {
        return Err(TableError::DealerOutput {
            match_name: match_name.to_string(),
            message: format!("expected {} ports, got {:?}", players, line.trim()),
        });
    }
    Ok(ports)
}

#[async_trait]
impl DealerLauncher for AcpcDealerLauncher {
    async fn start_dealer(&self, args: &DealerArguments, log_dir: &Path) -> Result<DealerInfo> {
        let program = self.program.to_string_lossy().into_owned();
        let program_path = if self.program.components().count() > 1 {
            Self::absolute(&self.program)?
        } else {
            self.program.clone()
        };
        let game_def_file = Self::absolute(&args.game_def_file)?;
        let argv = args.to_args(&game_def_file);

        let stderr_log = log_dir.join(format!("{}.dealer.err", args.match_name));
        let (_, stderr) = open_log(&program, &stderr_log)?;

        let mut cmd = detached_command(&program_path, &argv);
        cmd.current_dir(log_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(stderr);

        debug!(program = %program, args = ?argv, "Starting dealer");
        let mut child = cmd.spawn().map_err(|e| TableError::Launch {
            program: program.clone(),
            message: e.to_string(),
            source: Some(e),
        })?;

        let stdout = child.stdout.take().ok_or_else(|| TableError::Launch {
            program: program.clone(),
            message: "dealer stdout was not captured".to_string(),
            source: None,
        })?;

        let mut lines = BufReader::new(stdout).lines();
        let port_numbers = match Self::read_ports(&mut lines, args).await {
            Ok(ports) => ports,
            Err(e) => {
                Self::discard(child, &args.match_name).await;
                return Err(e);
            }
        };
        let pid = reap_in_background(child, &program)?;

        // The dealer reports scores on stdout later; keep the pipe open and
        // drained so it never blocks or dies writing to it.
        let match_name = args.match_name.clone();
        tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(match_name = %match_name, "dealer: {}", line);
            }
        });

        info!(pid, match_name = %args.match_name, ports = ?port_numbers, "Dealer started");
        Ok(DealerInfo { pid, port_numbers })
    }
}
