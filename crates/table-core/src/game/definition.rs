//! ACPC game definitions.
//!
//! Parses the `GAMEDEF ... END GAMEDEF` text format the dealer is started
//! with. The parsed value is immutable and serializes to the canonical map
//! stored on the match record for the web application.

use crate::error::{Result, TableError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest chip stack the dealer understands (its default when no stack is
/// given).
const UNLIMITED_STACK: u32 = i32::MAX as u32;
const UNLIMITED_RAISES: u32 = u8::MAX as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BettingType {
    Limit,
    NoLimit,
}

/// Parsed game definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameDefinition {
    pub betting_type: BettingType,
    pub number_of_players: usize,
    pub number_of_rounds: usize,
    /// Blind posted by each position.
    pub blinds: Vec<u32>,
    /// Fixed raise size per round (limit games).
    pub raise_sizes: Vec<u32>,
    /// Zero-based position that acts first in each round.
    pub first_player_positions: Vec<usize>,
    pub max_number_of_wagers: Vec<u32>,
    pub number_of_suits: u32,
    pub number_of_ranks: u32,
    pub number_of_hole_cards: u32,
    pub number_of_board_cards: Vec<u32>,
    pub chip_stacks: Vec<u32>,
}

impl GameDefinition {
    /// Read and parse a game definition file.
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| TableError::GameDefinition {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Self::parse(&text, path)
    }

    /// Parse game definition text. `origin` is only used in error messages.
    pub fn parse(text: &str, origin: &Path) -> Result<Self> {
        let fail = |message: String| TableError::GameDefinition {
            path: origin.to_path_buf(),
            message,
        };

        let mut betting_type = None;
        let mut players = None;
        let mut rounds = None;
        let mut blinds = Vec::new();
        let mut raise_sizes = Vec::new();
        let mut first_players = Vec::new();
        let mut max_raises = Vec::new();
        let mut suits = None;
        let mut ranks = None;
        let mut hole_cards = None;
        let mut board_cards = Vec::new();
        let mut stacks = Vec::new();
        let mut in_body = false;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let lower = line.to_ascii_lowercase();
            if lower == "gamedef" {
                in_body = true;
                continue;
            }
            if lower == "end gamedef" {
                break;
            }
            if !in_body {
                continue;
            }

            match lower.as_str() {
                "limit" => {
                    betting_type = Some(BettingType::Limit);
                    continue;
                }
                "nolimit" => {
                    betting_type = Some(BettingType::NoLimit);
                    continue;
                }
                _ => {}
            }

            let (key, value) = lower
                .split_once('=')
                .ok_or_else(|| fail(format!("unrecognized line {:?}", line)))?;
            let values: Vec<u32> = value
                .split_whitespace()
                .map(|v| v.parse::<u32>())
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| fail(format!("bad value for {}: {}", key.trim(), e)))?;
            let single = || {
                values
                    .first()
                    .copied()
                    .ok_or_else(|| fail(format!("{} needs a value", key.trim())))
            };

            match key.trim() {
                "numplayers" => players = Some(single()? as usize),
                "numrounds" => rounds = Some(single()? as usize),
                "blind" => blinds = values,
                "raisesize" => raise_sizes = values,
                "firstplayer" => first_players = values,
                "maxraises" => max_raises = values,
                "numsuits" => suits = Some(single()?),
                "numranks" => ranks = Some(single()?),
                "numholecards" => hole_cards = Some(single()?),
                "numboardcards" => board_cards = values,
                "stack" => stacks = values,
                other => return Err(fail(format!("unknown parameter {:?}", other))),
            }
        }

        let betting_type = betting_type.ok_or_else(|| fail("missing betting type".to_string()))?;
        let number_of_players = players.ok_or_else(|| fail("missing numPlayers".to_string()))?;
        let number_of_rounds = rounds.ok_or_else(|| fail("missing numRounds".to_string()))?;
        if number_of_players < 2 {
            return Err(fail(format!("numPlayers {} is below 2", number_of_players)));
        }
        if number_of_rounds == 0 {
            return Err(fail("numRounds must be positive".to_string()));
        }

        let per_player = |name: &str, values: Vec<u32>, default: u32| -> Result<Vec<u32>> {
            if values.is_empty() {
                return Ok(vec![default; number_of_players]);
            }
            if values.len() < number_of_players {
                return Err(fail(format!(
                    "{} lists {} values for {} players",
                    name,
                    values.len(),
                    number_of_players
                )));
            }
            Ok(values[..number_of_players].to_vec())
        };
        let per_round = |name: &str, values: Vec<u32>, default: Option<u32>| -> Result<Vec<u32>> {
            match (values.is_empty(), default) {
                (true, Some(default)) => Ok(vec![default; number_of_rounds]),
                (true, None) => Err(fail(format!("missing {}", name))),
                _ if values.len() < number_of_rounds => Err(fail(format!(
                    "{} lists {} values for {} rounds",
                    name,
                    values.len(),
                    number_of_rounds
                ))),
                _ => Ok(values[..number_of_rounds].to_vec()),
            }
        };

        let raise_default = match betting_type {
            BettingType::Limit => None,
            BettingType::NoLimit => Some(0),
        };
        let first_player_positions = per_round("firstPlayer", first_players, Some(1))?
            .into_iter()
            .map(|p| {
                let p = p as usize;
                if p == 0 || p > number_of_players {
                    Err(fail(format!("firstPlayer {} is not a seat", p)))
                } else {
                    Ok(p - 1)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            betting_type,
            number_of_players,
            number_of_rounds,
            blinds: per_player("blind", blinds, 0)?,
            raise_sizes: per_round("raiseSize", raise_sizes, raise_default)?,
            first_player_positions,
            max_number_of_wagers: per_round("maxRaises", max_raises, Some(UNLIMITED_RAISES))?,
            number_of_suits: suits.ok_or_else(|| fail("missing numSuits".to_string()))?,
            number_of_ranks: ranks.ok_or_else(|| fail("missing numRanks".to_string()))?,
            number_of_hole_cards: hole_cards
                .ok_or_else(|| fail("missing numHoleCards".to_string()))?,
            number_of_board_cards: per_round("numBoardCards", board_cards, Some(0))?,
            chip_stacks: per_player("stack", stacks, UNLIMITED_STACK)?,
        })
    }

    /// Canonical map persisted on the match record.
    pub fn to_hash(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn is_no_limit(&self) -> bool {
        self.betting_type == BettingType::NoLimit
    }
}
