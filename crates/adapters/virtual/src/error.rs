//! Virtual adapter error types.

use synhome_domain::error::{NotFoundError, RoutingError, SynHomeError};

/// Errors specific to the virtual adapter.
#[derive(Debug, thiserror::Error)]
pub enum VirtualError {
    #[error("virtual adapter {0} is not connected")]
    NotConnected(String),

    #[error("no simulated device {0}")]
    UnknownDevice(String),

    #[error("simulated devices do not understand {0}")]
    UnsupportedCommand(String),

    /// The adapter's listener is gone.
    #[error("virtual adapter listener stopped")]
    ListenerStopped,
}

impl VirtualError {
    /// Convert into a [`SynHomeError`] for propagation across port
    /// boundaries.
    pub fn into_domain(self) -> SynHomeError {
        match self {
            Self::NotConnected(adapter_id) => SynHomeError::NotConnected(adapter_id),
            Self::UnknownDevice(id) => NotFoundError {
                entity: "Remote device",
                id,
            }
            .into(),
            Self::UnsupportedCommand(command) => RoutingError::Unsupported { command }.into(),
            other @ Self::ListenerStopped => SynHomeError::transport(other),
        }
    }
}

impl From<VirtualError> for SynHomeError {
    fn from(err: VirtualError) -> Self {
        err.into_domain()
    }
}
