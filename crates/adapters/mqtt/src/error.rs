//! MQTT adapter error types.

use synhome_domain::error::SynHomeError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// No broker session is open.
    #[error("MQTT adapter {0} is not connected")]
    NotConnected(String),

    /// The rumqttc client rejected a request.
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),

    /// The event loop lost or failed to open the broker connection.
    #[error("MQTT connection error")]
    Connection(#[source] rumqttc::ConnectionError),

    /// The broker answered CONNECT with a failure code.
    #[error("MQTT broker refused the connection: {0:?}")]
    Refused(rumqttc::ConnectReturnCode),

    /// No CONNACK arrived within the connect timeout.
    #[error("timed out waiting for the MQTT broker")]
    Timeout,

    /// Failed to parse an incoming MQTT payload as JSON.
    #[error("failed to parse MQTT payload")]
    PayloadParse(#[source] serde_json::Error),

    /// A domain-level error (validation, not-found, etc.).
    #[error("domain error")]
    Domain(#[source] SynHomeError),
}

impl MqttError {
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

impl From<MqttError> for SynHomeError {
    fn from(err: MqttError) -> Self {
        err.into_domain()
    }
}
