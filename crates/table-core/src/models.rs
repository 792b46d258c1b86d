//! Shared data types: match identifiers and persisted match records.

use crate::error::{Result, TableError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Opaque identifier correlating a match record, its dealer, and its proxy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(String);

impl MatchId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MatchId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MatchId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Persisted configuration and published runtime facts of one match.
///
/// The web application creates the record; the table manager fills in
/// `port_numbers` and `game_def_hash` once they are known so the web side can
/// read them back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub name: String,
    pub game_definition_file: PathBuf,
    pub number_of_hands: u32,
    pub random_seed: u32,
    /// One name per seat, in seat order.
    pub player_names: Vec<String>,
    /// The human player's seat, 1-based.
    pub seat: usize,
    #[serde(default)]
    pub port_numbers: Option<Vec<u16>>,
    #[serde(default)]
    pub game_def_hash: Option<serde_json::Value>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl MatchRecord {
    /// Zero-based index of the human seat, checked against the player list.
    pub fn seat_index(&self) -> Result<usize> {
        if self.seat == 0 || self.seat > self.player_names.len() {
            return Err(TableError::InvalidParams {
                field: "seat".to_string(),
                message: format!(
                    "seat {} is outside 1..={} for match {}",
                    self.seat,
                    self.player_names.len(),
                    self.id
                ),
            });
        }
        Ok(self.seat - 1)
    }

    /// Seats other than the human's, as `(seat index, player name)`.
    pub fn opponent_seats(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        let human = self.seat.checked_sub(1);
        self.player_names
            .iter()
            .enumerate()
            .filter(move |(i, _)| Some(*i) != human)
            .map(|(i, name)| (i, name.as_str()))
    }

    /// Port bound for `seat_index`, once the dealer has reported its ports.
    pub fn port_for_seat(&self, seat_index: usize) -> Result<u16> {
        self.port_numbers
            .as_ref()
            .and_then(|ports| ports.get(seat_index).copied())
            .ok_or_else(|| TableError::DealerNotStarted {
                match_id: self.id.to_string(),
            })
    }
}
