//! Poker game model: definitions, match states, and actions.

mod action;
pub mod definition;
mod state;

pub use action::PokerAction;
pub use definition::{BettingType, GameDefinition};
pub use state::{MatchState, Turn};
