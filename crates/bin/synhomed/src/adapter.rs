//! The closed set of protocol adapters the daemon can run.

use synhome_adapter_mqtt::MqttAdapter;
use synhome_adapter_virtual::VirtualAdapter;
use synhome_adapter_websocket::WebSocketAdapter;
use synhome_app::ports::{ProtocolAdapter, StatusCallback};
use synhome_domain::discovery::DeviceDescriptor;
use synhome_domain::error::SynHomeError;
use synhome_domain::id::AdapterId;
use synhome_domain::operation::Operation;
use synhome_domain::reconnect::ConnectionState;

use crate::config::{AdapterConfig, TransportConfig};

/// One configured adapter, whatever its transport.
pub enum Adapter {
    Mqtt(MqttAdapter),
    WebSocket(WebSocketAdapter),
    Virtual(VirtualAdapter),
}

impl Adapter {
    #[must_use]
    pub fn from_config(config: AdapterConfig) -> Self {
        match config.transport {
            TransportConfig::Mqtt(mqtt) => Self::Mqtt(MqttAdapter::new(config.id, *mqtt)),
            TransportConfig::Websocket(ws) => Self::WebSocket(WebSocketAdapter::new(config.id, *ws)),
            TransportConfig::Virtual(simulated) => {
                Self::Virtual(VirtualAdapter::new(config.id, &simulated))
            }
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Mqtt(_) => "mqtt",
            Self::WebSocket(_) => "websocket",
            Self::Virtual(_) => "virtual",
        }
    }
}

impl ProtocolAdapter for Adapter {
    fn id(&self) -> &AdapterId {
        match self {
            Self::Mqtt(a) => a.id(),
            Self::WebSocket(a) => a.id(),
            Self::Virtual(a) => a.id(),
        }
    }

    fn state(&self) -> ConnectionState {
        match self {
            Self::Mqtt(a) => a.state(),
            Self::WebSocket(a) => a.state(),
            Self::Virtual(a) => a.state(),
        }
    }

    async fn connect(&self) -> Result<(), SynHomeError> {
        match self {
            Self::Mqtt(a) => a.connect().await,
            Self::WebSocket(a) => a.connect().await,
            Self::Virtual(a) => a.connect().await,
        }
    }

    async fn disconnect(&self) -> Result<(), SynHomeError> {
        match self {
            Self::Mqtt(a) => a.disconnect().await,
            Self::WebSocket(a) => a.disconnect().await,
            Self::Virtual(a) => a.disconnect().await,
        }
    }

    async fn discover_devices(&self) -> Result<Vec<DeviceDescriptor>, SynHomeError> {
        match self {
            Self::Mqtt(a) => a.discover_devices().await,
            Self::WebSocket(a) => a.discover_devices().await,
            Self::Virtual(a) => a.discover_devices().await,
        }
    }

    async fn send_command(&self, device_id: &str, operation: &Operation) -> Result<(), SynHomeError> {
        match self {
            Self::Mqtt(a) => a.send_command(device_id, operation).await,
            Self::WebSocket(a) => a.send_command(device_id, operation).await,
            Self::Virtual(a) => a.send_command(device_id, operation).await,
        }
    }

    fn register_status_callback(&self, callback: StatusCallback) {
        match self {
            Self::Mqtt(a) => a.register_status_callback(callback),
            Self::WebSocket(a) => a.register_status_callback(callback),
            Self::Virtual(a) => a.register_status_callback(callback),
        }
    }
}
