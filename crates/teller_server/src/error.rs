//! Error types for the session layer.

use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the session layer.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The client sent a line that is not a valid command for its role.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Login failed: unknown account, wrong password, or wrong role.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Engine error surfaced to the session.
    #[error("ledger error: {0}")]
    Ledger(#[from] teller_core::CoreError),

    /// A blocking engine task was cancelled or panicked.
    #[error("engine task failed: {0}")]
    EngineTask(#[from] tokio::task::JoinError),

    /// I/O error on the client connection.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
