//! Client side of the dealer's text protocol.
//!
//! After connecting, a player announces the protocol version. The dealer then
//! sends one `MATCHSTATE` line per state change, and the player answers a state
//! where it must act by echoing the line with `:<action>` appended.

use crate::config::DealerConfig;
use crate::error::{Result, TableError};
use crate::game::{MatchState, PokerAction};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, trace};

/// Where a seat's dealer port is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A live connection to one seat of a dealer.
#[async_trait]
pub trait DealerConnection: Send {
    /// Next match state, or `None` once the dealer closes the connection.
    async fn next_state(&mut self) -> Result<Option<MatchState>>;

    /// Answer `state` with `action`.
    async fn send_action(&mut self, state: &MatchState, action: &PokerAction) -> Result<()>;
}

/// Opens dealer connections.
#[async_trait]
pub trait DealerConnector: Send + Sync {
    async fn connect(&self, info: &ConnectionInfo) -> Result<Box<dyn DealerConnection>>;
}

/// Connects over TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDealerConnector;

#[async_trait]
impl DealerConnector for TcpDealerConnector {
    async fn connect(&self, info: &ConnectionInfo) -> Result<Box<dyn DealerConnection>> {
        let stream = TcpStream::connect((info.host.as_str(), info.port))
            .await
            .map_err(|e| TableError::Connection {
                host: info.host.clone(),
                port: info.port,
                message: e.to_string(),
            })?;
        stream.set_nodelay(true).ok();

        let (read_half, write_half) = stream.into_split();
        let mut connection = TcpDealerConnection {
            info: info.clone(),
            reader: BufReader::new(read_half),
            writer: write_half,
        };
        connection.send_line(DealerConfig::PROTOCOL_VERSION).await?;
        debug!(dealer = %info, "Connected to dealer");
        Ok(Box::new(connection))
    }
}

struct TcpDealerConnection {
    info: ConnectionInfo,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TcpDealerConnection {
    fn io_error(&self, e: std::io::Error) -> TableError {
        TableError::Connection {
            host: self.info.host.clone(),
            port: self.info.port,
            message: e.to_string(),
        }
    }

    async fn send_line(&mut self, line: &str) -> Result<()> {
        let wire = format!("{}{}", line, DealerConfig::LINE_TERMINATOR);
        let result = async {
            self.writer.write_all(wire.as_bytes()).await?;
            self.writer.flush().await
        }
        .await;
        result.map_err(|e| self.io_error(e))
    }
}

#[async_trait]
impl DealerConnection for TcpDealerConnection {
    async fn next_state(&mut self) -> Result<Option<MatchState>> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .reader
                .read_line(&mut line)
                .await
                .map_err(|e| self.io_error(e))?;
            if read == 0 {
                return Ok(None);
            }
            let trimmed = line.trim_end_matches(['\r', '\n']);
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }
            trace!(dealer = %self.info, "<- {}", trimmed);
            return MatchState::parse(trimmed).map(Some);
        }
    }

    async fn send_action(&mut self, state: &MatchState, action: &PokerAction) -> Result<()> {
        let line = format!("{}:{}", state.as_str(), action.to_acpc());
        trace!(dealer = %self.info, "-> {}", line);
        self.send_line(&line).await
    }
}
