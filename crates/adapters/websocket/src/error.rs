//! WebSocket adapter error types.

use synhome_domain::error::SynHomeError;
use tokio_tungstenite::tungstenite;

/// Errors specific to the WebSocket adapter.
#[derive(Debug, thiserror::Error)]
pub enum WsError {
    /// No WebSocket session is open.
    #[error("WebSocket adapter {0} is not connected")]
    NotConnected(String),

    /// Opening the connection or the handshake failed.
    #[error("WebSocket connection failed")]
    Connect(#[source] Box<tungstenite::Error>),

    /// The configured token cannot be sent as an HTTP header.
    #[error("invalid authorization header value")]
    InvalidHeader,

    /// The server answered the auth message with `success: false`.
    #[error("WebSocket authentication rejected: {0}")]
    AuthRejected(String),

    /// The server did not answer within the configured timeout.
    #[error("timed out waiting for the WebSocket server")]
    Timeout,

    /// The server closed the connection.
    #[error("WebSocket connection closed")]
    Closed,

    /// Writing a frame failed.
    #[error("failed to send WebSocket message")]
    Send(#[source] Box<tungstenite::Error>),

    /// Failed to parse an incoming message as JSON.
    #[error("failed to parse WebSocket message")]
    PayloadParse(#[source] serde_json::Error),

    /// A domain-level error (validation, not-found, etc.).
    #[error("domain error")]
    Domain(#[source] SynHomeError),
}

impl WsError {
    pub(crate) fn connect(err: tungstenite::Error) -> Self {
        Self::Connect(Box::new(err))
    }

    pub(crate) fn send(err: tungstenite::Error) -> Self {
        Self::Send(Box::new(err))
    }

    /// Convert into a [`SynHomeError`] for propagation across port
    /// boundaries; transport failures are boxed.
    pub fn into_domain(self) -> SynHomeError {
        match self {
            Self::Domain(err) => err,
            Self::NotConnected(adapter_id) => SynHomeError::NotConnected(adapter_id),
            other => SynHomeError::transport(other),
        }
    }
}

impl From<WsError> for SynHomeError {
    fn from(err: WsError) -> Self {
        err.into_domain()
    }
}
