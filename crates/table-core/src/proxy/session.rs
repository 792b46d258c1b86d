use super::connection::{ConnectionInfo, DealerConnection, DealerConnector};
use crate::error::{Result, TableError};
use crate::game::{GameDefinition, MatchState, PokerAction, Turn};
use crate::models::MatchId;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Told whenever the proxied seat has something to look at: its turn, a
/// finished hand, or the end of the match.
#[async_trait]
pub trait StateListener: Send + Sync {
    async fn on_actionable(&self, match_id: &MatchId) -> Result<()>;
}

/// What a proxy session is created from.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub match_id: MatchId,
    pub connection: ConnectionInfo,
    /// Zero-based seat the session plays for.
    pub seat_index: usize,
    pub game: GameDefinition,
    pub player_names: Vec<String>,
    pub number_of_hands: u32,
}

/// The human seat's connection to a dealer.
pub struct ProxySession {
    config: SessionConfig,
    connection: Box<dyn DealerConnection>,
    listener: Arc<dyn StateListener>,
    last_state: Option<MatchState>,
    ended: bool,
}

impl ProxySession {
    /// Connect to the dealer and read up to the first state worth showing.
    pub async fn start(
        config: SessionConfig,
        connector: &dyn DealerConnector,
        listener: Arc<dyn StateListener>,
    ) -> Result<Self> {
        let connection = connector.connect(&config.connection).await?;
        info!(
            match_id = %config.match_id,
            seat = config.seat_index + 1,
            dealer = %config.connection,
            "Proxy session connected"
        );

        let mut session = Self {
            config,
            connection,
            listener,
            last_state: None,
            ended: false,
        };
        session.advance().await?;
        Ok(session)
    }

    /// Submit the seat's action and wait for the next state worth showing.
    ///
    /// When the last state is not the seat's turn (the hand is over) the
    /// action only moves the session on to the next hand.
    pub async fn play(&mut self, action: &PokerAction) -> Result<()> {
        if self.ended {
            debug!(match_id = %self.config.match_id, "Match already ended; ignoring action");
            return Ok(());
        }

        let state = self.last_state.as_ref().ok_or_else(|| {
            TableError::protocol(format!(
                "no match state received yet for match {}",
                self.config.match_id
            ))
        })?;

        if state.is_our_turn(&self.config.game)? {
            action.validate_for(&self.config.game)?;
            self.connection.send_action(state, action).await?;
            debug!(match_id = %self.config.match_id, action = %action, "Action sent");
        } else {
            debug!(
                match_id = %self.config.match_id,
                hand = state.hand_number,
                "Hand over; moving to the next hand"
            );
        }

        self.advance().await
    }

    /// Read states until the seat must act, the hand ends, or the match ends,
    /// then notify the listener.
    async fn advance(&mut self) -> Result<()> {
        loop {
            let Some(state) = self.connection.next_state().await? else {
                info!(match_id = %self.config.match_id, "Dealer closed the connection");
                self.ended = true;
                break;
            };

            let stop = match state.turn(&self.config.game)? {
                Turn::Position(position) => position == state.position,
                Turn::HandOver => {
                    if state.hand_number.saturating_add(1) >= self.config.number_of_hands {
                        info!(match_id = %self.config.match_id, "Final hand finished");
                        self.ended = true;
                    }
                    true
                }
                Turn::Dealer => false,
            };
            self.last_state = Some(state);
            if stop {
                break;
            }
        }

        self.listener.on_actionable(&self.config.match_id).await
    }

    pub fn last_state(&self) -> Option<&MatchState> {
        self.last_state.as_ref()
    }

    /// Set once the dealer closes the connection or the final hand is over.
    pub fn match_ended(&self) -> bool {
        self.ended
    }
}

impl fmt::Debug for ProxySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxySession")
            .field("match_id", &self.config.match_id)
            .field("connection", &self.config.connection)
            .field("seat_index", &self.config.seat_index)
            .field("last_state", &self.last_state)
            .field("ended", &self.ended)
            .finish()
    }
}
