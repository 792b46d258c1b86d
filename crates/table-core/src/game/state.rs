//! ACPC match states and the minimal betting replay needed to tell whose
//! turn it is.

use super::definition::{BettingType, GameDefinition};
use crate::config::DealerConfig;
use crate::error::{Result, TableError};
use std::fmt;

/// One `MATCHSTATE:<position>:<hand>:<betting>:<cards>` line from the dealer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchState {
    raw: String,
    /// Zero-based position of the receiving seat in this hand.
    pub position: usize,
    pub hand_number: u32,
    pub betting: String,
    pub cards: String,
}

/// Who the dealer is waiting on after a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    /// The player at this position must act.
    Position(usize),
    /// Betting for the round is closed and more cards follow.
    Dealer,
    HandOver,
}

impl MatchState {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut parts = line.splitn(5, ':');
        if parts.next() != Some(DealerConfig::MATCH_STATE_PREFIX) {
            return Err(TableError::protocol(format!(
                "expected a match state, got {:?}",
                line
            )));
        }
        let mut field = |name: &str| {
            parts
                .next()
                .ok_or_else(|| TableError::protocol(format!("match state lacks {}: {:?}", name, line)))
        };
        let position = field("position")?;
        let hand_number = field("hand number")?;
        let betting = field("betting")?.to_string();
        let cards = field("cards")?.to_string();

        Ok(Self {
            raw: line.to_string(),
            position: position
                .parse()
                .map_err(|_| TableError::protocol(format!("bad position {:?}", position)))?,
            hand_number: hand_number
                .parse()
                .map_err(|_| TableError::protocol(format!("bad hand number {:?}", hand_number)))?,
            betting,
            cards,
        })
    }

    /// The line as received, without its terminator.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Replay the betting string to find who acts next.
    pub fn turn(&self, game: &GameDefinition) -> Result<Turn> {
        Betting::replay(self, game).map(|b| b.turn())
    }

    /// Whether the receiving seat is the one to act.
    pub fn is_our_turn(&self, game: &GameDefinition) -> Result<bool> {
        Ok(self.turn(game)? == Turn::Position(self.position))
    }

    pub fn is_hand_over(&self, game: &GameDefinition) -> Result<bool> {
        Ok(self.turn(game)? == Turn::HandOver)
    }
}

impl fmt::Display for MatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Chips and flags per position after replaying a betting string.
struct Betting<'g> {
    game: &'g GameDefinition,
    round: usize,
    spent: Vec<u64>,
    folded: Vec<bool>,
    /// Positions that have acted since the last raise in the current round.
    acted: Vec<bool>,
    next: Option<usize>,
}

impl<'g> Betting<'g> {
    fn replay(state: &MatchState, game: &'g GameDefinition) -> Result<Self> {
        let players = game.number_of_players;
        if state.position >= players {
            return Err(TableError::protocol(format!(
                "position {} in a {}-player game",
                state.position, players
            )));
        }

        let rounds: Vec<&str> = state.betting.split('/').collect();
        if rounds.len() > game.number_of_rounds {
            return Err(TableError::protocol(format!(
                "{} betting rounds in a {}-round game",
                rounds.len(),
                game.number_of_rounds
            )));
        }

        let mut betting = Self {
            game,
            round: 0,
            spent: game.blinds.iter().map(|&b| b as u64).collect(),
            folded: vec![false; players],
            acted: vec![false; players],
            next: None,
        };

        for (round, actions) in rounds.iter().enumerate() {
            betting.round = round;
            betting.acted = vec![false; players];
            betting.next = betting.first_able_from(game.first_player_positions[round]);

            let mut chars = actions.chars().peekable();
            while let Some(c) = chars.next() {
                let actor = betting.next.ok_or_else(|| {
                    TableError::protocol(format!("action after betting closed in {:?}", state.betting))
                })?;
                let max = betting.max_spent();
                match c {
                    'f' => betting.folded[actor] = true,
                    'c' => betting.spent[actor] = max.min(betting.stack(actor)),
                    'r' => {
                        let mut digits = String::new();
                        while let Some(d) = chars.next_if(|d| d.is_ascii_digit()) {
                            digits.push(d);
                        }
                        let target = match game.betting_type {
                            BettingType::NoLimit => digits.parse::<u64>().map_err(|_| {
                                TableError::protocol(format!(
                                    "no-limit raise without an amount in {:?}",
                                    state.betting
                                ))
                            })?,
                            BettingType::Limit => max + game.raise_sizes[round] as u64,
                        };
                        betting.spent[actor] = target.min(betting.stack(actor));
                        betting.acted = vec![false; players];
                    }
                    other => {
                        return Err(TableError::protocol(format!(
                            "unknown betting action {:?} in {:?}",
                            other, state.betting
                        )))
                    }
                }
                betting.acted[actor] = true;
                betting.next = betting.first_able_from(actor + 1);
            }
        }

        Ok(betting)
    }

    fn stack(&self, position: usize) -> u64 {
        self.game.chip_stacks[position] as u64
    }

    fn max_spent(&self) -> u64 {
        self.spent.iter().copied().max().unwrap_or(0)
    }

    /// Still in the hand with chips behind.
    fn can_act(&self, position: usize) -> bool {
        !self.folded[position] && self.spent[position] < self.stack(position)
    }

    fn first_able_from(&self, start: usize) -> Option<usize> {
        let players = self.game.number_of_players;
        (0..players)
            .map(|offset| (start + offset) % players)
            .find(|&p| self.can_act(p))
    }

    fn turn(&self) -> Turn {
        let players = self.game.number_of_players;
        let in_hand = self.folded.iter().filter(|f| !**f).count();
        if in_hand <= 1 {
            return Turn::HandOver;
        }

        let max = self.max_spent();
        let able: Vec<usize> = (0..players).filter(|&p| self.can_act(p)).collect();
        let round_open = able
            .iter()
            .any(|&p| self.spent[p] < max || (!self.acted[p] && able.len() > 1));

        match self.next {
            Some(next) if round_open => Turn::Position(next),
            _ if able.len() <= 1 || self.round + 1 >= self.game.number_of_rounds => Turn::HandOver,
            _ => Turn::Dealer,
        }
    }
}
