//! Error types for the table manager.
//!
//! Every fallible operation in the crate returns [`TableError`]. Errors are not
//! caught below the request dispatcher; [`TableError::category`] tells the
//! dispatcher boundary what kind of failure it is reporting.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the table manager.
#[derive(Debug, Error)]
pub enum TableError {
    // Launch errors
    #[error("Failed to launch {program}: {message}")]
    Launch {
        program: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Dealer for {match_name} reported unusable ports: {message}")]
    DealerOutput { match_name: String, message: String },

    // Connection errors
    #[error("Cannot connect to dealer at {host}:{port}: {message}")]
    Connection {
        host: String,
        port: u16,
        message: String,
    },

    #[error("Dealer connection for match {match_id} closed unexpectedly")]
    ConnectionClosed { match_id: String },

    // Protocol errors
    #[error("Dealer protocol error: {message}")]
    Protocol { message: String },

    #[error("Invalid poker action {action:?}: {message}")]
    InvalidAction { action: String, message: String },

    // Configuration and request errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("No bot named {name:?} in the roster")]
    UnknownBot { name: String },

    #[error("Dealer not started for match {match_id}")]
    DealerNotStarted { match_id: String },

    #[error("Invalid parameter {field}: {message}")]
    InvalidParams { field: String, message: String },

    // Game definition errors
    #[error("Game definition error in {path:?}: {message}")]
    GameDefinition { path: PathBuf, message: String },

    // Persistence errors
    #[error("Match not found: {match_id}")]
    MatchNotFound { match_id: String },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Notification errors
    #[error("Failed to publish to {channel}: {message}")]
    Publish { channel: String, message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for table manager operations.
pub type Result<T> = std::result::Result<T, TableError>;

/// Coarse classification used when reporting failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A process or the dealer failed to start.
    Launch,
    /// The dealer could not be reached or dropped the connection.
    Connection,
    /// The dealer or proxy rejected an action or sent something unreadable.
    Protocol,
    /// Settings, roster, or request parameters are wrong.
    Config,
    /// Match records could not be loaded or saved.
    Persistence,
    /// The realtime channel could not be reached.
    Notification,
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCategory::Launch => "launch",
            ErrorCategory::Connection => "connection",
            ErrorCategory::Protocol => "protocol",
            ErrorCategory::Config => "config",
            ErrorCategory::Persistence => "persistence",
            ErrorCategory::Notification => "notification",
            ErrorCategory::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl From<std::io::Error> for TableError {
    fn from(err: std::io::Error) -> Self {
        TableError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for TableError {
    fn from(err: serde_json::Error) -> Self {
        TableError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl TableError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        TableError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        TableError::Protocol {
            message: message.into(),
        }
    }

    /// Classify the error for logs and alerts.
    pub fn category(&self) -> ErrorCategory {
        match self {
            TableError::Launch { .. } | TableError::DealerOutput { .. } => ErrorCategory::Launch,

            TableError::Connection { .. } | TableError::ConnectionClosed { .. } => {
                ErrorCategory::Connection
            }

            TableError::Protocol { .. } | TableError::InvalidAction { .. } => {
                ErrorCategory::Protocol
            }

            TableError::Config { .. }
            | TableError::UnknownBot { .. }
            | TableError::DealerNotStarted { .. }
            | TableError::InvalidParams { .. }
            | TableError::GameDefinition { .. } => ErrorCategory::Config,

            TableError::MatchNotFound { .. } | TableError::Io { .. } | TableError::Json { .. } => {
                ErrorCategory::Persistence
            }

            TableError::Publish { .. } => ErrorCategory::Notification,

            TableError::Other(_) => ErrorCategory::Internal,
        }
    }
}
