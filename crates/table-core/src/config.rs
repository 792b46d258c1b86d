//! Configuration for the table manager.
//!
//! Fixed limits live in unit structs as associated constants. Everything an
//! operator may change lives in [`Settings`], loaded from a JSON file whose
//! fields all have defaults.

use crate::error::{Result, TableError};
use crate::store::atomic::atomic_read_json;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Job intake limits.
pub struct IntakeConfig;

impl IntakeConfig {
    /// Largest job frame accepted from a client.
    pub const MAX_FRAME_SIZE: usize = 1024 * 1024; // 1MB
    pub const MAX_CONNECTIONS: usize = 64;
    /// Jobs buffered ahead of the worker pool.
    pub const QUEUE_DEPTH: usize = 256;
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Dealer protocol constants.
pub struct DealerConfig;

impl DealerConfig {
    pub const PROTOCOL_VERSION: &'static str = "VERSION:2.0.0";
    pub const MATCH_STATE_PREFIX: &'static str = "MATCHSTATE";
    pub const LINE_TERMINATOR: &'static str = "\r\n";
}

/// Alert delivery.
pub struct AlertConfig;

impl AlertConfig {
    pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);
}

/// Directory and file naming.
pub struct PathsConfig;

impl PathsConfig {
    pub const MATCH_LOGS_DIR_NAME: &'static str = "match_logs";
    pub const BOT_LOGS_DIR_NAME: &'static str = "bot_logs";
    pub const MATCH_RECORD_EXTENSION: &'static str = "json";
}

/// Request codes as they appear on the wire.
///
/// The strings are shared with the web application that enqueues jobs, so
/// they are configurable rather than fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestCodes {
    pub start_match: String,
    pub start_proxy: String,
    pub play_action: String,
    pub delete_irrelevant_matches: String,
}

impl Default for RequestCodes {
    fn default() -> Self {
        Self {
            start_match: "start".to_string(),
            start_proxy: "start_proxy".to_string(),
            play_action: "play".to_string(),
            delete_irrelevant_matches: "delete_irrelevant_matches".to_string(),
        }
    }
}

/// Runtime settings for a table worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub request_codes: RequestCodes,
    /// Pub/sub channel every browser-facing server subscribes to.
    pub realtime_channel: String,
    /// Prefix of the per-match channel name carried inside each event.
    pub player_action_channel_prefix: String,
    pub message_server_url: String,
    /// Host the dealer binds its seat ports on, as seen by proxies and bots.
    pub dealer_host: String,
    pub dealer_program: PathBuf,
    pub log_directory: PathBuf,
    pub match_store_directory: PathBuf,
    pub bot_roster_file: PathBuf,
    pub alert_webhook: Option<String>,
    /// Match records untouched for longer than this are deleted on request.
    pub irrelevant_match_age_secs: u64,
    pub workers: usize,
    pub intake_addr: SocketAddr,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            request_codes: RequestCodes::default(),
            realtime_channel: "realtime".to_string(),
            player_action_channel_prefix: "player-action-in-".to_string(),
            message_server_url: "redis://127.0.0.1:6379".to_string(),
            dealer_host: "127.0.0.1".to_string(),
            dealer_program: PathBuf::from("dealer"),
            log_directory: PathBuf::from("log"),
            match_store_directory: PathBuf::from("matches"),
            bot_roster_file: PathBuf::from("bots.json"),
            alert_webhook: None,
            irrelevant_match_age_secs: 24 * 60 * 60,
            workers: 4,
            intake_addr: SocketAddr::from(([127, 0, 0, 1], 7400)),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let settings: Settings = atomic_read_json(path)?.unwrap_or_default();
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(TableError::Config {
                message: "workers must be at least 1".to_string(),
            });
        }
        let codes = [
            &self.request_codes.start_match,
            &self.request_codes.start_proxy,
            &self.request_codes.play_action,
            &self.request_codes.delete_irrelevant_matches,
        ];
        for (i, code) in codes.iter().enumerate() {
            if codes[i + 1..].contains(code) {
                return Err(TableError::Config {
                    message: format!("request code {:?} is used twice", code),
                });
            }
        }
        Ok(())
    }

    /// Directory the dealer writes its match logs into.
    pub fn match_log_directory(&self) -> PathBuf {
        self.log_directory.join(PathsConfig::MATCH_LOGS_DIR_NAME)
    }

    /// Directory opponent bot output is captured into.
    pub fn bot_log_directory(&self) -> PathBuf {
        self.log_directory.join(PathsConfig::BOT_LOGS_DIR_NAME)
    }

    pub fn irrelevant_match_age(&self) -> Duration {
        Duration::from_secs(self.irrelevant_match_age_secs)
    }
}
