//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`SynHomeError`] via `#[from]`. Transport failures coming from adapter
//! crates are boxed so the domain never depends on a protocol library.

use std::error::Error;

/// Top-level error shared by the domain, application and adapter layers.
#[derive(Debug, thiserror::Error)]
pub enum SynHomeError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("adapter {0} is not connected")]
    NotConnected(String),

    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn Error + Send + Sync>),
}

impl SynHomeError {
    /// Box an arbitrary transport failure.
    pub fn transport(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::Transport(err.into())
    }
}

/// A value or a configuration failed a domain invariant.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("identifier must not be empty")]
    EmptyId,

    #[error("capability {capability} must list at least one allowed value")]
    EmptyChoices { capability: String },

    #[error("capability {capability} has min {min} greater than max {max}")]
    InvalidRange {
        capability: String,
        min: f64,
        max: f64,
    },

    #[error("capability {0} is declared twice")]
    DuplicateCapability(String),

    #[error("device {0} is declared twice")]
    DuplicateDevice(String),

    #[error("unknown capability {0}")]
    UnknownCapability(String),

    #[error("value {value} for {capability} is outside [{min}, {max}]")]
    OutOfRange {
        capability: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("value {value:?} is not allowed for {capability}")]
    InvalidChoice { capability: String, value: String },

    #[error("value {value:?} for {capability} is not a number")]
    NotANumber { capability: String, value: String },
}

/// An interpreted command could not be routed to an action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    #[error("could not determine target device")]
    NoTarget,

    #[error("interpretation carries no command")]
    MissingCommand,

    #[error("interpretation is not a JSON object")]
    Malformed,

    #[error("unsupported command {command}")]
    Unsupported { command: String },

    #[error("no parameter of {command} matches a capability")]
    NoMatchingParameter { command: String },
}

/// A lookup by identifier found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}
