use super::definition::GameDefinition;
use crate::error::{Result, TableError};
use std::fmt;
use std::str::FromStr;

/// An action the human seat submits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PokerAction {
    Fold,
    /// Call or check.
    Call,
    /// Raise or bet, with the total wager for no-limit games.
    Raise(Option<u64>),
}

impl PokerAction {
    /// The action in the dealer's wire form (`f`, `c`, `r`, `r<amount>`).
    pub fn to_acpc(&self) -> String {
        match self {
            PokerAction::Fold => "f".to_string(),
            PokerAction::Call => "c".to_string(),
            PokerAction::Raise(None) => "r".to_string(),
            PokerAction::Raise(Some(amount)) => format!("r{}", amount),
        }
    }

    /// Check the action fits the game's betting type.
    pub fn validate_for(&self, game: &GameDefinition) -> Result<()> {
        match (self, game.is_no_limit()) {
            (PokerAction::Raise(None), true) => Err(TableError::InvalidAction {
                action: self.to_acpc(),
                message: "no-limit raises need an amount".to_string(),
            }),
            (PokerAction::Raise(Some(_)), false) => Err(TableError::InvalidAction {
                action: self.to_acpc(),
                message: "limit raises take no amount".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

impl FromStr for PokerAction {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self> {
        let action = s.trim().to_ascii_lowercase();
        let invalid = |message: &str| TableError::InvalidAction {
            action: s.to_string(),
            message: message.to_string(),
        };

        match action.as_str() {
            "f" | "fold" => return Ok(PokerAction::Fold),
            "c" | "k" | "call" | "check" => return Ok(PokerAction::Call),
            "r" | "b" | "raise" | "bet" => return Ok(PokerAction::Raise(None)),
            "" => return Err(invalid("empty action")),
            _ => {}
        }

        let amount = action
            .strip_prefix('r')
            .or_else(|| action.strip_prefix('b'))
            .ok_or_else(|| invalid("expected fold, call, check, raise or bet"))?;
        amount
            .parse::<u64>()
            .map(|amount| PokerAction::Raise(Some(amount)))
            .map_err(|_| invalid("raise amount is not a number"))
    }
}

impl fmt::Display for PokerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_acpc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::definition::fixtures::*;
    use std::path::Path;

    #[test]
    fn test_parse_words_and_letters() {
        assert_eq!("fold".parse::<PokerAction>().unwrap(), PokerAction::Fold);
        assert_eq!("K".parse::<PokerAction>().unwrap(), PokerAction::Call);
        assert_eq!(" check ".parse::<PokerAction>().unwrap(), PokerAction::Call);
        assert_eq!("bet".parse::<PokerAction>().unwrap(), PokerAction::Raise(None));
        assert_eq!(
            "r250".parse::<PokerAction>().unwrap(),
            PokerAction::Raise(Some(250))
        );
        assert_eq!(
            "b1200".parse::<PokerAction>().unwrap(),
            PokerAction::Raise(Some(1200))
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "x", "r-5", "raise250", "rabc"] {
            assert!(
                matches!(bad.parse::<PokerAction>(), Err(TableError::InvalidAction { .. })),
                "{:?} should not parse",
                bad
            );
        }
    }

    #[test]
    fn test_wire_form() {
        assert_eq!(PokerAction::Fold.to_acpc(), "f");
        assert_eq!(PokerAction::Call.to_acpc(), "c");
        assert_eq!(PokerAction::Raise(Some(300)).to_string(), "r300");
    }

    #[test]
    fn test_validate_against_betting_type() {
        let limit = GameDefinition::parse(HOLDEM_LIMIT_2P, Path::new("l.game")).unwrap();
        let nolimit = GameDefinition::parse(HOLDEM_NOLIMIT_2P, Path::new("n.game")).unwrap();

        assert!(PokerAction::Raise(None).validate_for(&limit).is_ok());
        assert!(PokerAction::Raise(Some(40)).validate_for(&limit).is_err());
        assert!(PokerAction::Raise(None).validate_for(&nolimit).is_err());
        assert!(PokerAction::Raise(Some(400)).validate_for(&nolimit).is_ok());
        assert!(PokerAction::Fold.validate_for(&nolimit).is_ok());
    }
}
