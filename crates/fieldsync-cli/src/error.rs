use std::io;

use fieldsync_core::sync::{SyncError, TransportError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] fieldsync_core::Error),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid action ID '{0}'")]
    InvalidActionId(String),
    #[error("No plot matches '{0}'")]
    PlotNotFound(String),
    #[error("Expected TRAIT=VALUE, got '{0}'")]
    InvalidAssignment(String),
    #[error("{failed} of {attempted} observations could not be saved")]
    IncompleteSubmit { failed: usize, attempted: usize },
    #[error("Server {0} is unreachable; queued actions were kept")]
    ServerUnreachable(String),
    #[error("Sync stopped at action {action_id}: {error}")]
    SyncHalted { action_id: String, error: String },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Sync is not configured. Run `fieldsync config init --api-base-url <URL>` or set FIELDSYNC_API_URL."
    )]
    SyncNotConfigured,
}
