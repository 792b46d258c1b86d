//! Proxy sessions: the human seat's side of a dealer connection.

mod connection;
mod session;

pub use connection::{ConnectionInfo, DealerConnection, DealerConnector, TcpDealerConnector};
pub use session::{ProxySession, SessionConfig, StateListener};
