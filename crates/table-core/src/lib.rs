//! Table Core - runtime orchestration for ACPC poker matches.
//!
//! For each match this crate launches a dealer process, launches the
//! automated opponents, and holds a proxy session that plays the human seat
//! against the dealer. Jobs from the web application arrive as
//! (request, match id, parameters) triples and are routed by
//! [`TableManager::handle`]; the player's browser is told when there is
//! something to act on through a pub/sub channel.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use table_core::{JobServer, Settings, TableManager};
//!
//! #[tokio::main]
//! async fn main() -> table_core::Result<()> {
//!     let settings = Settings::load("settings.json".as_ref())?;
//!     let addr = settings.intake_addr;
//!     let workers = settings.workers;
//!     let manager = Arc::new(TableManager::builder(settings).build()?);
//!
//!     let handle = JobServer::start(addr, manager, workers).await?;
//!     tokio::signal::ctrl_c().await?;
//!     handle.join().await;
//!     Ok(())
//! }
//! ```

pub mod alert;
pub mod config;
pub mod dealer;
pub mod error;
pub mod game;
pub mod intake;
pub mod manager;
pub mod models;
pub mod notify;
pub mod platform;
pub mod process;
pub mod proxy;
pub mod registry;
pub mod roster;
pub mod store;

// Re-export commonly used types
pub use alert::{AlertContext, AlertSink, TracingAlertSink, WebhookAlertSink};
pub use config::{RequestCodes, Settings};
pub use dealer::{AcpcDealerLauncher, DealerArguments, DealerInfo, DealerLauncher};
pub use error::{ErrorCategory, Result, TableError};
pub use game::{GameDefinition, MatchState, PokerAction, Turn};
pub use intake::{Job, JobAck, JobClient, JobHandler, JobServer, JobServerHandle};
pub use manager::{RequestCode, TableManager, TableManagerBuilder};
pub use models::{MatchId, MatchRecord};
pub use notify::{ActionNotifier, Publisher, RedisPublisher};
pub use process::{OsProcessLauncher, OsProcessProbe, ProcessLauncher, ProcessProbe};
pub use proxy::{
    ConnectionInfo, DealerConnection, DealerConnector, ProxySession, SessionConfig,
    StateListener, TcpDealerConnector,
};
pub use registry::{LockedEntry, MatchRegistry, RegistryEntry};
pub use roster::{BotRoster, BotSpec, RosterLoader};
pub use store::{JsonMatchStore, MatchStore};
