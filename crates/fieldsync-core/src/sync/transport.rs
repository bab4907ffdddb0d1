//! Transport seam between the drain loop and the remote server

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::models::PendingSyncAction;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid sync transport configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Sync request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Sync request timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),
    /// The server refused the action itself; resending it unchanged will not help
    #[error("Server rejected action: {message} ({status})")]
    Rejected { status: u16, message: String },
    /// The server refused the credentials, not the action
    #[error("Server refused credentials: {message} ({status})")]
    Unauthorized { status: u16, message: String },
    /// The request did not reach a usable endpoint (wrong URL, route or method)
    #[error("Server endpoint refused the request: {message} ({status})")]
    Endpoint { status: u16, message: String },
    /// The server failed or asked the client to back off
    #[error("Server error: {message} ({status})")]
    Server { status: u16, message: String },
}

pub type TransportResult<T> = Result<T, TransportError>;

impl TransportError {
    /// Classify a non-success HTTP status
    ///
    /// 408, 429 and 5xx are transient. 400, 409, 410 and 422 reject the
    /// payload. 401 and 403 point at credentials; any other 4xx points at
    /// the endpoint. Neither of those is the action's fault, so the action
    /// stays queued.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            408 | 429 => Self::Server { status, message },
            400 | 409 | 410 | 422 => Self::Rejected { status, message },
            401 | 403 => Self::Unauthorized { status, message },
            402..=499 => Self::Endpoint { status, message },
            _ => Self::Server { status, message },
        }
    }

    /// Whether sending the same action again later may succeed
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Timeout(_) | Self::Server { .. }
        )
    }

    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Delivers one queued action to the server
///
/// `Ok` means the server acknowledged the action and it may be removed.
pub trait SyncTransport: Send + Sync {
    fn send(
        &self,
        action: &PendingSyncAction,
    ) -> impl Future<Output = TransportResult<()>> + Send;
}
