//! Dealer process launch.
//!
//! A dealer serves one match. It binds one port per seat and reports them on
//! the first line of its standard output; players then connect to their port.

mod acpc;

pub use acpc::AcpcDealerLauncher;

use crate::error::Result;
use crate::models::MatchRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A running dealer. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealerInfo {
    pub pid: u32,
    /// One port per seat, in seat order.
    pub port_numbers: Vec<u16>,
}

/// Everything the dealer needs on its command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealerArguments {
    pub match_name: String,
    pub game_def_file: PathBuf,
    pub number_of_hands: u32,
    pub random_seed: u32,
    pub player_names: Vec<String>,
    /// Extra dealer flags, passed through untouched.
    pub options: BTreeMap<String, String>,
}

impl DealerArguments {
    pub fn from_record(record: &MatchRecord, options: BTreeMap<String, String>) -> Self {
        Self {
            match_name: record.name.clone(),
            game_def_file: record.game_definition_file.clone(),
            number_of_hands: record.number_of_hands,
            random_seed: record.random_seed,
            player_names: record.player_names.clone(),
            options,
        }
    }

    /// Arguments after the program name.
    ///
    /// Options render as `-<flag> <value>`, or a bare `-<flag>` when the value
    /// is empty.
    pub fn to_args(&self, game_def_file: &Path) -> Vec<String> {
        let mut args = vec![
            self.match_name.clone(),
            game_def_file.to_string_lossy().into_owned(),
            self.number_of_hands.to_string(),
            self.random_seed.to_string(),
        ];
        args.extend(self.player_names.iter().cloned());
        for (flag, value) in &self.options {
            args.push(format!("-{}", flag.trim_start_matches('-')));
            if !value.is_empty() {
                args.push(value.clone());
            }
        }
        args
    }
}

/// Starts dealers.
#[async_trait]
pub trait DealerLauncher: Send + Sync {
    /// Launch a dealer whose logs go into `log_dir` and wait for its ports.
    async fn start_dealer(&self, args: &DealerArguments, log_dir: &Path) -> Result<DealerInfo>;
}
