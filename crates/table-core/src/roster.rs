//! Opponent bot roster.
//!
//! The roster maps a bot's player name to the command that runs it. Every
//! bot command takes the dealer host and its seat port as its final two
//! arguments. The roster is re-read from disk on each match start, so bots
//! can be added while the worker runs.

use crate::error::{Result, TableError};
use crate::store::atomic::atomic_read_json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::info;

/// How to run one bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotSpec {
    /// Program and leading arguments.
    pub runner: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotRoster {
    #[serde(default)]
    pub bots: HashMap<String, BotSpec>,
}

impl BotRoster {
    /// Command line for `name` playing on `port` of a dealer at `host`.
    pub fn command_for(&self, name: &str, host: &str, port: u16) -> Result<Vec<String>> {
        let spec = self.bots.get(name).ok_or_else(|| TableError::UnknownBot {
            name: name.to_string(),
        })?;
        if spec.runner.is_empty() {
            return Err(TableError::Config {
                message: format!("bot {:?} has an empty runner", name),
            });
        }
        let mut command = spec.runner.clone();
        command.push(host.to_string());
        command.push(port.to_string());
        Ok(command)
    }
}

/// Loads the roster file and keeps the latest version.
#[derive(Debug)]
pub struct RosterLoader {
    path: PathBuf,
    version: AtomicU64,
    current: RwLock<Arc<BotRoster>>,
}

impl RosterLoader {
    /// Create a loader. Nothing is read until [`RosterLoader::reload`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            version: AtomicU64::new(0),
            current: RwLock::new(Arc::new(BotRoster::default())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the roster file and swap it in. A missing file is an empty
    /// roster. Returns the new version number.
    pub fn reload(&self) -> Result<u64> {
        let roster: BotRoster = atomic_read_json(&self.path)?.unwrap_or_default();
        let bots = roster.bots.len();

        let mut current = self
            .current
            .write()
            .map_err(|_| TableError::Other("bot roster lock poisoned".to_string()))?;
        *current = Arc::new(roster);
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        drop(current);

        info!(version, bots, path = %self.path.display(), "Reloaded bot roster");
        Ok(version)
    }

    /// The roster as of the last reload.
    pub fn roster(&self) -> Arc<BotRoster> {
        match self.current.read() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}
